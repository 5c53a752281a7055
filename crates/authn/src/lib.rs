//! # togo Authentication
//!
//! Session tokens for the togo task service.
//!
//! This crate provides:
//! - **Token codec**: issuing and verifying HS256-signed session tokens
//! - **Auth gate**: turning an `Authorization` header into an authenticated user
//! - **Algorithm validation**: refusing `none` and every algorithm the service does not issue
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use togo_authn::{DEFAULT_TOKEN_TTL, TokenCodec, gate::authenticate};
//! use togo_storage::UserId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = TokenCodec::new(b"wqGyEBBfPK9w3Lxw", DEFAULT_TOKEN_TTL)?;
//! let user = UserId::parse("firstUser").ok_or("empty id")?;
//! let token = codec.issue(&user)?;
//!
//! let header = format!("Bearer {token}");
//! let authenticated = authenticate(&codec, Some(&header), Utc::now())?;
//! assert_eq!(authenticated.user_id, user);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Authentication error types.
pub mod error;
/// Request authentication gate.
pub mod gate;
/// Session token issuing and verification.
pub mod jwt;
/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
/// Algorithm validation.
pub mod validation;

// Re-export key types for convenience
pub use error::{AuthError, Result};
pub use gate::{AuthenticatedUser, authenticate, extract_token};
pub use jwt::{DEFAULT_TOKEN_TTL, TokenClaims, TokenCodec};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
