//! Trust Hub Credentials: issuer and verifier for Ed25519-signed
//! healthcare attestations.

pub mod error;
pub mod issuer;
pub mod verifier;

pub use error::{CredentialError, Rejection};
pub use issuer::CredentialIssuer;
pub use verifier::{CredentialVerifier, Verified};
