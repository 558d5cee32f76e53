//! Profile model, host configuration document, and validation rules for Baton.
//!
//! This crate defines the schema layer: server definitions (`ServerConfig`),
//! user-managed profiles (`Profile`), the host application's configuration
//! document (`HostConfiguration`), and the validation engine that gates every
//! write (`Validator`, `ValidationResult`).

pub mod host;
pub mod profile;
pub mod types;
pub mod validation;

pub use host::{HostConfiguration, SERVERS_KEY};
pub use profile::{Profile, ServerConfig, ServerMap};
pub use types::ProfileId;
pub use validation::{
    format_report, validate_document, validate_profile, validate_server, validate_servers,
    IssueCode, Severity, ValidationIssue, ValidationResult, Validator,
};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed configuration document: {0}")]
    MalformedDocument(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
