/// Router Module Index
///
/// Splits the API into the routes anyone may call and the routes guarded by
/// the capability middleware. Protection is applied once, as a layer on the
/// whole authenticated router, so no protected handler is reachable without
/// passing through it.

/// Routes accessible without a token (health, register, login).
pub mod public;

/// Routes behind `require_capability`. Role rules come from `auth::CAPABILITIES`.
pub mod authenticated;
