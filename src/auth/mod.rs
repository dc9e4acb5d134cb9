//! Authentication module
//!
//! ShipHero issues long-lived refresh tokens; every run trades one for a
//! bearer access token before any stream starts. The `Authenticator` does
//! that exchange once and caches the result until shortly before it expires.

mod authenticator;
mod types;

pub use authenticator::{Authenticator, DEFAULT_AUTH_URL};
pub use types::{AuthConfig, CachedToken};
