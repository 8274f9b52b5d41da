//! Authentication core for the NEPSE web portal
//!
//! The portal gates its JSON API behind an obfuscated scheme: the token
//! endpoint returns two scrambled strings plus five numeric salts, and the
//! real tokens are recovered by running a vendor wasm module over the salts
//! to compute cut indices. A second derivation turns one of the salts into
//! the numeric payload id certain POST endpoints demand.
//!
//! # Components
//!
//! - [`WasmTransform`] / [`TokenTransform`] — loads the vendor transform
//!   module and exposes its five cut-index functions
//! - [`descramble`] — recovers the access and refresh tokens from a raw
//!   authenticate response
//! - [`compute_payload_id`] — derives the id for signed POST bodies
//! - [`Session`] — owns credentials and orchestrates authenticate/refresh
//!
//! # Example
//!
//! ```no_run
//! use nepse_auth::{Session, WasmTransform};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transform = WasmTransform::from_env()?;
//!     let mut session = Session::new(transform);
//!
//!     session.authenticate().await?;
//!     let headers = session.auth_headers().await?;
//!     println!("salts: {:?}", session.salts());
//!
//!     Ok(())
//! }
//! ```

pub mod descramble;
pub mod error;
pub mod session;
pub mod signer;
pub mod transform;

// Re-export main types
pub use descramble::{descramble, DescrambledTokens, RawTokenResponse, Salts};
pub use error::{AuthError, AuthResult};
pub use session::{Credentials, Session, AUTH_SCHEME, DEFAULT_BASE_URL, PORTAL_USER_AGENT};
pub use signer::{compute_payload_id, DEFAULT_BASE_ID};
pub use transform::{TokenTransform, WasmTransform, TRANSFORM_EXPORTS, TRANSFORM_PATH_ENV};
