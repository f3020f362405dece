use thiserror::Error;

/// Lowest accepted bcrypt work factor. Anything cheaper is refused at construction.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Highest work factor bcrypt supports.
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error, PartialEq)]
pub enum HashError {
    /// The hasher cannot produce a hash: bad cost or no entropy source.
    #[error("password hashing is misconfigured: {0}")]
    Configuration(String),

    /// The stored hash string is not a valid bcrypt hash.
    #[error("stored password hash is malformed")]
    InvalidHashFormat,
}

/// Salt and digest of a throwaway bcrypt hash. Combined with the configured
/// cost it is as expensive to check as a stored credential.
const DECOY_HASH_BODY: &str = "N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// PasswordHasher
///
/// Salted, adaptive one-way hashing built on bcrypt. Every hash embeds its own
/// random salt and cost, so hashes created under an older cost keep verifying
/// after the configured cost is raised.
///
/// Both operations are CPU-bound; async callers should run them on
/// the blocking pool (`tokio::task::spawn_blocking`).
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Creates a hasher with the given work factor.
    ///
    /// # Errors
    /// `HashError::Configuration` if `cost` is below `MIN_BCRYPT_COST` or above `MAX_BCRYPT_COST`.
    pub fn new(cost: u32) -> Result<Self, HashError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(HashError::Configuration(format!(
                "bcrypt cost {cost} outside {MIN_BCRYPT_COST}..={MAX_BCRYPT_COST}"
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hashes `plaintext` with a fresh random salt.
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        bcrypt::hash(plaintext, self.cost).map_err(|e| HashError::Configuration(e.to_string()))
    }

    /// Checks `plaintext` against a stored hash. A mismatch is `Ok(false)`;
    /// only an unparseable hash is an error.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, HashError> {
        bcrypt::verify(plaintext, hash).map_err(|_| HashError::InvalidHashFormat)
    }

    /// A well-formed hash at this hasher's cost that belongs to no account.
    pub fn decoy_hash(&self) -> String {
        format!("$2b${:02}${DECOY_HASH_BODY}", self.cost)
    }

    /// Spends the same work as `verify` when there is no stored hash to check,
    /// so an unknown account answers no faster than a wrong password.
    pub fn verify_decoy(&self, plaintext: &str) {
        let _ = bcrypt::verify(plaintext, &self.decoy_hash());
    }
}
