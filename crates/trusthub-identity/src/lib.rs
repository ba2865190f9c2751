//! Trust Hub Identity Layer
//!
//! Resolves issuer identifiers to the public key and verification method that
//! every credential proof is checked against. The registry is loaded once
//! from configuration and never mutated afterwards.

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{IssuerEntry, IssuerRecord, IssuerRole, TrustRegistry};
