//! Trust Hub Agents
//!
//! Orchestration around the credential core:
//! - `attestation`: issue healthcare, lab and pharmacy attestations from
//!   claims plus an external semantic judgment
//! - `authorization`: approve or deny prior-authorization requests from a
//!   presented credential
//! - `ledger`: append-only, TTL-bound audit records
//! - `collaborators`, `schema`: seams for semantic validation, structural
//!   checks and clinical policy
//! - `dispatch`: one typed entry point for every operation

pub mod attestation;
pub mod authorization;
pub mod collaborators;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod privacy;
pub mod schema;

pub use attestation::{
    AttestRequest, AttestationKind, AttestationResult, AttestationService, ComplianceStatus,
};
pub use authorization::{
    AuthorizationDecision, AuthorizationDecisionService, DecideRequest, DecisionOutcome,
};
pub use collaborators::{
    AcceptVerified, AuthorizationPolicy, Judgment, RequireCompliantStatus, SemanticValidator,
    StaticValidator, StructuralValidator, ValidatorError,
};
pub use dispatch::{Dispatcher, Request, Response, VerifyOutcome, VerifyRequest};
pub use error::{ErrorCode, ServiceError};
pub use ledger::{InMemoryLedger, InputSummary, LedgerError, LedgerRecord, LedgerStore, PutOutcome};
pub use schema::{
    structural_validator, ClaimDefinition, ClaimSchema, ClaimType, FhirResourceValidator,
    SchemaValidator,
};
