use super::{colorize_severity, Context, EXIT_SUCCESS, EXIT_VALIDATION_ERROR};
use baton_core::CoreError;
use baton_schema::{
    format_report, validate_document, HostConfiguration, ServerMap, ValidationResult, Validator,
};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Report {
    target: String,
    #[serde(flatten)]
    result: ValidationResult,
}

pub fn run(ctx: &Context, profile: Option<&str>, file: Option<&Path>) -> Result<u8, CoreError> {
    let report = match (profile, file) {
        (Some(key), _) => {
            let profile = ctx.profiles()?.find(key)?;
            Report {
                target: format!("profile '{}'", profile.name),
                result: Validator::default().validate_profile(&profile),
            }
        }
        (None, Some(path)) => validate_file(path)?,
        (None, None) => validate_file(&ctx.settings.config_path()?)?,
    };
    let valid = report.result.valid;

    ctx.emit(report, |r| {
        println!("{}", console::style(&r.target).bold());
        let text = format_report(&r.result);
        for line in text.lines() {
            match line {
                "errors:" => println!("{}:", colorize_severity(baton_schema::Severity::Error)),
                "warnings:" => {
                    println!("{}:", colorize_severity(baton_schema::Severity::Warning));
                }
                "info:" => println!("{}:", colorize_severity(baton_schema::Severity::Info)),
                other => println!("{other}"),
            }
        }
    })?;
    Ok(if valid { EXIT_SUCCESS } else { EXIT_VALIDATION_ERROR })
}

/// Structural checks on the document, then the server rules on every entry
/// that names a command.
fn validate_file(path: &Path) -> Result<Report, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(baton_schema::SchemaError::from)?;
    let target = path.display().to_string();

    let structural = validate_document(&value);
    if !structural.valid {
        return Ok(Report {
            target,
            result: structural,
        });
    }

    let servers: ServerMap = HostConfiguration::from_value(value)?
        .servers()?
        .into_iter()
        .filter(|(_, s)| !s.command.is_empty())
        .collect();
    let semantic = Validator::default().validate_servers(&servers);
    let issues = structural
        .issues()
        .chain(semantic.issues())
        .cloned()
        .collect();
    Ok(Report {
        target,
        result: ValidationResult::from_issues(issues),
    })
}
