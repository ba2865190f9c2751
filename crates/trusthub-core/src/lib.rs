//! Trust Hub Core: credential data model and canonical encoding shared by
//! every agent that issues or checks healthcare attestations.

pub mod canonical;
pub mod credential;
pub mod error;
pub mod timestamp;

pub use canonical::{encode, CanonicalBytes};
pub use credential::{
    ClaimMap, Credential, Proof, ASSERTION_METHOD, ED25519_SIGNATURE_2020,
    VERIFIABLE_CREDENTIAL,
};
pub use error::CoreError;
