use crate::CoreError;
use baton_schema::ValidationIssue;
use serde::Serialize;
use std::path::PathBuf;

/// Uniform `{ success, data?, error? }` shape for every public operation, so
/// outer layers render failures without matching on error types.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub critical: bool,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            backup_path: None,
            issues: Vec::new(),
            critical: false,
        }
    }

    pub fn err(error: &CoreError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code()),
            backup_path: error.backup_path().map(PathBuf::from),
            issues: error.issues().to_vec(),
            critical: error.is_critical(),
        }
    }

    #[must_use]
    pub fn with_backup(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.backup_path = path;
        }
        self
    }
}

impl<T> From<Result<T, CoreError>> for OperationResult<T> {
    fn from(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}
