//! Session authentication gateway: credential extraction, remote session
//! validation and role gating.

pub mod cache;
pub mod middleware;
pub mod role;
pub mod session;
pub mod token;

pub use role::{AuthorizationGate, Decision, Role};
pub use session::{AuthFailure, IdentityTraits, Session, SessionValidator};
pub use token::{Credential, TokenExtractor};
