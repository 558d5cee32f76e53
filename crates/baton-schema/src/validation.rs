//! Validation engine for server definitions, profiles and host documents.
//!
//! Every check is pure apart from the optional existence check on absolute
//! command paths. Issues are accumulated rather than short-circuited and come
//! out in a fixed order (structural, security, convention, existence), so the
//! same input always yields the same list.

use crate::profile::{Profile, ServerConfig, ServerMap};
use crate::host::SERVERS_KEY;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

pub const MAX_PROFILE_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_SERVER_NAME_LENGTH: usize = 50;
pub const MAX_COMMAND_LENGTH: usize = 500;
pub const MAX_ARG_LENGTH: usize = 200;
pub const MAX_ENV_KEY_LENGTH: usize = 100;
pub const MAX_ENV_VALUE_LENGTH: usize = 1000;
pub const MAX_ARGS_COUNT: usize = 50;
pub const MAX_ENV_VARS_COUNT: usize = 100;

/// Installation prefixes under which an absolute command is unremarkable.
pub const ALLOWED_COMMAND_PREFIXES: &[&str] = &["/usr/local/bin/", "/usr/bin/", "/bin/", "/opt/"];

/// Utilities that can destroy data or escalate privileges.
pub const DANGEROUS_COMMANDS: &[&str] = &[
    "rm", "rmdir", "sudo", "su", "chmod", "chown", "dd", "mkfs", "fdisk", "format", "del",
    "deltree",
];

pub const RESERVED_ENV_VARS: &[&str] = &["PATH", "HOME", "USER", "SHELL", "PWD", "OLDPWD"];

const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>',
];

const PROBLEMATIC_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Stable machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // server structure
    InvalidServerName,
    ServerNameTooLong,
    MissingCommand,
    CommandTooLong,
    TooManyArgs,
    ArgTooLong,
    TooManyEnvVars,
    InvalidEnvKey,
    EnvKeyTooLong,
    EnvValueTooLong,
    // security
    DangerousCommand,
    SuspiciousPath,
    ShellInjectionRisk,
    UnrecognizedPath,
    SuspiciousEnvValue,
    // convention
    InvalidServerNameFormat,
    InvalidEnvKeyFormat,
    ReservedEnvVar,
    // existence
    CommandNotFound,
    CommandNotFile,
    CommandNotExecutable,
    // profile
    MissingId,
    EmptyName,
    NameTooLong,
    InvalidNameChars,
    DescriptionTooLong,
    NoServersConfigured,
    // host document
    InvalidConfigStructure,
    InvalidMcpServersType,
    InvalidConfigType,
    InvalidArgsType,
    InvalidArgType,
    InvalidEnvType,
    InvalidEnvValueType,
    UnknownProperty,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::InvalidServerName => "INVALID_SERVER_NAME",
            IssueCode::ServerNameTooLong => "SERVER_NAME_TOO_LONG",
            IssueCode::MissingCommand => "MISSING_COMMAND",
            IssueCode::CommandTooLong => "COMMAND_TOO_LONG",
            IssueCode::TooManyArgs => "TOO_MANY_ARGS",
            IssueCode::ArgTooLong => "ARG_TOO_LONG",
            IssueCode::TooManyEnvVars => "TOO_MANY_ENV_VARS",
            IssueCode::InvalidEnvKey => "INVALID_ENV_KEY",
            IssueCode::EnvKeyTooLong => "ENV_KEY_TOO_LONG",
            IssueCode::EnvValueTooLong => "ENV_VALUE_TOO_LONG",
            IssueCode::DangerousCommand => "DANGEROUS_COMMAND",
            IssueCode::SuspiciousPath => "SUSPICIOUS_PATH",
            IssueCode::ShellInjectionRisk => "SHELL_INJECTION_RISK",
            IssueCode::UnrecognizedPath => "UNRECOGNIZED_PATH",
            IssueCode::SuspiciousEnvValue => "SUSPICIOUS_ENV_VALUE",
            IssueCode::InvalidServerNameFormat => "INVALID_SERVER_NAME_FORMAT",
            IssueCode::InvalidEnvKeyFormat => "INVALID_ENV_KEY_FORMAT",
            IssueCode::ReservedEnvVar => "RESERVED_ENV_VAR",
            IssueCode::CommandNotFound => "COMMAND_NOT_FOUND",
            IssueCode::CommandNotFile => "COMMAND_NOT_FILE",
            IssueCode::CommandNotExecutable => "COMMAND_NOT_EXECUTABLE",
            IssueCode::MissingId => "MISSING_ID",
            IssueCode::EmptyName => "EMPTY_NAME",
            IssueCode::NameTooLong => "NAME_TOO_LONG",
            IssueCode::InvalidNameChars => "INVALID_NAME_CHARS",
            IssueCode::DescriptionTooLong => "DESCRIPTION_TOO_LONG",
            IssueCode::NoServersConfigured => "NO_SERVERS_CONFIGURED",
            IssueCode::InvalidConfigStructure => "INVALID_CONFIG_STRUCTURE",
            IssueCode::InvalidMcpServersType => "INVALID_MCP_SERVERS_TYPE",
            IssueCode::InvalidConfigType => "INVALID_CONFIG_TYPE",
            IssueCode::InvalidArgsType => "INVALID_ARGS_TYPE",
            IssueCode::InvalidArgType => "INVALID_ARG_TYPE",
            IssueCode::InvalidEnvType => "INVALID_ENV_TYPE",
            IssueCode::InvalidEnvValueType => "INVALID_ENV_VALUE_TYPE",
            IssueCode::UnknownProperty => "UNKNOWN_PROPERTY",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationIssue {
    fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            field: None,
            value: None,
        }
    }

    fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    fn info(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    fn at(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Qualify the field path with a parent, e.g. `command` -> `servers.git.command`.
    fn prefixed(mut self, parent: &str) -> Self {
        self.field = Some(match self.field.take() {
            Some(field) => format!("{parent}.{field}"),
            None => parent.to_owned(),
        });
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "[{}] {} ({field})", self.code, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Issues split by severity. `valid` is true iff `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let mut result = Self::default();
        for issue in issues {
            match issue.severity {
                Severity::Error => result.errors.push(issue),
                Severity::Warning => result.warnings.push(issue),
                Severity::Info => result.info.push(issue),
            }
        }
        result.valid = result.errors.is_empty();
        result
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All issues: errors, then warnings, then info.
    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }

    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues().any(|i| i.code == code)
    }

    /// One-line summary of the errors, for embedding in error messages.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn into_issues(self) -> impl Iterator<Item = ValidationIssue> {
        self.errors
            .into_iter()
            .chain(self.warnings)
            .chain(self.info)
    }
}

/// Validation entry point.
///
/// The only configurable aspect is whether absolute command paths are checked
/// on the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    filesystem_checks: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            filesystem_checks: true,
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn without_filesystem_checks(mut self) -> Self {
        self.filesystem_checks = false;
        self
    }

    pub fn validate_server(&self, name: &str, config: &ServerConfig) -> ValidationResult {
        ValidationResult::from_issues(self.server_issues(name, config))
    }

    pub fn validate_servers(&self, servers: &ServerMap) -> ValidationResult {
        ValidationResult::from_issues(self.servers_issues(servers))
    }

    pub fn validate_profile(&self, profile: &Profile) -> ValidationResult {
        let mut issues = Vec::new();

        if profile.id.trim().is_empty() {
            issues.push(
                ValidationIssue::error(IssueCode::MissingId, "Profile must have a valid ID")
                    .at("id"),
            );
        }

        if profile.name.trim().is_empty() {
            issues.push(
                ValidationIssue::error(IssueCode::EmptyName, "Profile name cannot be empty")
                    .at("name")
                    .with_value(profile.name.clone()),
            );
        } else {
            if profile.name.chars().count() > MAX_PROFILE_NAME_LENGTH {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::NameTooLong,
                        format!(
                            "Profile name is too long (max {MAX_PROFILE_NAME_LENGTH} characters)"
                        ),
                    )
                    .at("name")
                    .with_value(profile.name.clone()),
                );
            }
            if profile.name.contains(PROBLEMATIC_NAME_CHARS) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::InvalidNameChars,
                        "Profile name contains characters that may cause issues",
                    )
                    .at("name")
                    .with_value(profile.name.clone()),
                );
            }
        }

        if let Some(description) = &profile.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::DescriptionTooLong,
                        format!(
                            "Profile description is too long (max {MAX_DESCRIPTION_LENGTH} characters)"
                        ),
                    )
                    .at("description"),
                );
            }
        }

        issues.extend(self.servers_issues(&profile.servers));
        ValidationResult::from_issues(issues)
    }

    fn servers_issues(&self, servers: &ServerMap) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if servers.is_empty() {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::NoServersConfigured,
                    "No servers configured in profile",
                )
                .at("servers"),
            );
        }
        for (name, config) in servers {
            let parent = format!("servers.{name}");
            // Re-categorized so each server contributes errors, warnings, info in that order.
            let result = self.validate_server(name, config);
            issues.extend(result.into_issues().map(|issue| issue.prefixed(&parent)));
        }
        issues
    }

    fn server_issues(&self, name: &str, config: &ServerConfig) -> Vec<ValidationIssue> {
        let mut issues = structural_issues(name, config);
        issues.extend(security_issues(config));
        issues.extend(convention_issues(name, config));
        if self.filesystem_checks && is_absolute_command(&config.command) {
            issues.extend(existence_issues(&config.command));
        }
        issues
    }
}

pub fn validate_server(name: &str, config: &ServerConfig) -> ValidationResult {
    Validator::default().validate_server(name, config)
}

pub fn validate_servers(servers: &ServerMap) -> ValidationResult {
    Validator::default().validate_servers(servers)
}

pub fn validate_profile(profile: &Profile) -> ValidationResult {
    Validator::default().validate_profile(profile)
}

fn structural_issues(name: &str, config: &ServerConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if name.trim().is_empty() {
        issues.push(
            ValidationIssue::error(
                IssueCode::InvalidServerName,
                "Server name must be a non-empty string",
            )
            .at("name"),
        );
    } else if name.chars().count() > MAX_SERVER_NAME_LENGTH {
        issues.push(
            ValidationIssue::error(
                IssueCode::ServerNameTooLong,
                format!(
                    "Server name \"{name}\" is too long (max {MAX_SERVER_NAME_LENGTH} characters)"
                ),
            )
            .at("name")
            .with_value(name),
        );
    }

    if config.command.trim().is_empty() {
        issues.push(
            ValidationIssue::error(
                IssueCode::MissingCommand,
                "Server configuration must have a command",
            )
            .at("command"),
        );
    } else if config.command.chars().count() > MAX_COMMAND_LENGTH {
        issues.push(
            ValidationIssue::error(
                IssueCode::CommandTooLong,
                format!("Command is too long (max {MAX_COMMAND_LENGTH} characters)"),
            )
            .at("command"),
        );
    }

    if config.args.len() > MAX_ARGS_COUNT {
        issues.push(
            ValidationIssue::warning(
                IssueCode::TooManyArgs,
                format!(
                    "Too many arguments ({}), maximum recommended is {MAX_ARGS_COUNT}",
                    config.args.len()
                ),
            )
            .at("args"),
        );
    }
    for (index, arg) in config.args.iter().enumerate() {
        if arg.chars().count() > MAX_ARG_LENGTH {
            issues.push(
                ValidationIssue::error(
                    IssueCode::ArgTooLong,
                    format!(
                        "Argument at index {index} is too long (max {MAX_ARG_LENGTH} characters)"
                    ),
                )
                .at(format!("args[{index}]"))
                .with_value(arg.clone()),
            );
        }
    }

    if let Some(env) = &config.env {
        if env.len() > MAX_ENV_VARS_COUNT {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::TooManyEnvVars,
                    format!(
                        "Too many environment variables ({}), maximum recommended is {MAX_ENV_VARS_COUNT}",
                        env.len()
                    ),
                )
                .at("env"),
            );
        }
        for (key, value) in env {
            if key.is_empty() {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::InvalidEnvKey,
                        "Environment variable key must be a non-empty string",
                    )
                    .at("env"),
                );
                continue;
            }
            if key.chars().count() > MAX_ENV_KEY_LENGTH {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::EnvKeyTooLong,
                        format!(
                            "Environment variable key \"{key}\" is too long (max {MAX_ENV_KEY_LENGTH} characters)"
                        ),
                    )
                    .at(format!("env.{key}")),
                );
            }
            if value.chars().count() > MAX_ENV_VALUE_LENGTH {
                issues.push(
                    ValidationIssue::error(
                        IssueCode::EnvValueTooLong,
                        format!(
                            "Environment variable \"{key}\" value is too long (max {MAX_ENV_VALUE_LENGTH} characters)"
                        ),
                    )
                    .at(format!("env.{key}")),
                );
            }
        }
    }

    issues
}

fn security_issues(config: &ServerConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let command = config.command.as_str();

    if !command.trim().is_empty() {
        let base = command_basename(command);
        if DANGEROUS_COMMANDS.contains(&base.as_str()) {
            issues.push(
                ValidationIssue::error(
                    IssueCode::DangerousCommand,
                    format!("Command \"{base}\" is not allowed for security reasons"),
                )
                .at("command")
                .with_value(command),
            );
        }

        if command.contains("..") || command.contains("//") {
            issues.push(
                ValidationIssue::error(
                    IssueCode::SuspiciousPath,
                    "Command path contains suspicious patterns (.. or //)",
                )
                .at("command")
                .with_value(command),
            );
        }

        if command.contains(SHELL_METACHARACTERS) {
            issues.push(
                ValidationIssue::error(
                    IssueCode::ShellInjectionRisk,
                    "Command contains potentially dangerous characters",
                )
                .at("command")
                .with_value(command),
            );
        }

        if is_absolute_command(command)
            && !ALLOWED_COMMAND_PREFIXES
                .iter()
                .any(|prefix| command.starts_with(prefix))
        {
            issues.push(
                ValidationIssue::warning(
                    IssueCode::UnrecognizedPath,
                    format!("Command path \"{command}\" is not in recognized system locations"),
                )
                .at("command")
                .with_value(command),
            );
        }
    }

    if let Some(env) = &config.env {
        for (key, value) in env {
            if key.is_empty() {
                continue;
            }
            if value.contains("..") || value.contains(SHELL_METACHARACTERS) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::SuspiciousEnvValue,
                        format!(
                            "Environment variable \"{key}\" contains potentially dangerous characters"
                        ),
                    )
                    .at(format!("env.{key}")),
                );
            }
        }
    }

    issues
}

fn convention_issues(name: &str, config: &ServerConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if !name.trim().is_empty() && !is_valid_identifier(name) {
        issues.push(
            ValidationIssue::warning(
                IssueCode::InvalidServerNameFormat,
                format!(
                    "Server name \"{name}\" should be a valid identifier (alphanumeric, underscore, hyphen)"
                ),
            )
            .at("name")
            .with_value(name),
        );
    }

    if let Some(env) = &config.env {
        for key in env.keys().filter(|k| !k.is_empty()) {
            if !is_env_key_convention(key) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::InvalidEnvKeyFormat,
                        format!(
                            "Environment variable key \"{key}\" should follow convention (uppercase, underscores only)"
                        ),
                    )
                    .at(format!("env.{key}"))
                    .with_value(key.clone()),
                );
            }
            if RESERVED_ENV_VARS.contains(&key.as_str()) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::ReservedEnvVar,
                        format!("Environment variable \"{key}\" is a reserved system variable"),
                    )
                    .at(format!("env.{key}"))
                    .with_value(key.clone()),
                );
            }
        }
    }

    issues
}

fn existence_issues(command: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match std::fs::metadata(command) {
        Err(_) => issues.push(
            ValidationIssue::error(
                IssueCode::CommandNotFound,
                format!("Command \"{command}\" does not exist"),
            )
            .at("command")
            .with_value(command),
        ),
        Ok(meta) if !meta.is_file() => issues.push(
            ValidationIssue::error(
                IssueCode::CommandNotFile,
                format!("Command path \"{command}\" exists but is not a file"),
            )
            .at("command")
            .with_value(command),
        ),
        Ok(meta) => {
            if !is_executable(&meta) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCode::CommandNotExecutable,
                        format!("Command \"{command}\" may not be executable"),
                    )
                    .at("command")
                    .with_value(command),
                );
            }
        }
    }
    issues
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

/// Last whitespace- or slash-separated token, lowercased.
fn command_basename(command: &str) -> String {
    command
        .rsplit(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn is_absolute_command(command: &str) -> bool {
    Path::new(command).is_absolute()
}

/// `[A-Za-z][A-Za-z0-9_-]*`
fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// `[A-Z_][A-Z0-9_]*`
fn is_env_key_convention(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Structural validation of an untyped host configuration document.
///
/// Only shapes are checked here; the semantic rules above apply to profiles.
/// Servers without a `command` are tolerated because hosts also accept
/// non-process server entries.
pub fn validate_document(value: &Value) -> ValidationResult {
    let mut issues = Vec::new();

    let Value::Object(root) = value else {
        issues.push(
            ValidationIssue::error(
                IssueCode::InvalidConfigStructure,
                "Configuration must be a plain object",
            )
            .at("config"),
        );
        return ValidationResult::from_issues(issues);
    };

    if let Some(servers) = root.get(SERVERS_KEY) {
        match servers {
            Value::Object(map) => {
                for (name, server) in map {
                    issues.extend(document_server_issues(name, server));
                }
            }
            _ => issues.push(
                ValidationIssue::error(
                    IssueCode::InvalidMcpServersType,
                    format!("{SERVERS_KEY} must be a plain object"),
                )
                .at(SERVERS_KEY),
            ),
        }
    }

    for key in root.keys().filter(|k| k.as_str() != SERVERS_KEY) {
        issues.push(
            ValidationIssue::info(
                IssueCode::UnknownProperty,
                format!("Unknown configuration property: {key}"),
            )
            .at(key.clone()),
        );
    }

    ValidationResult::from_issues(issues)
}

fn document_server_issues(name: &str, server: &Value) -> Vec<ValidationIssue> {
    let parent = format!("{SERVERS_KEY}.{name}");
    let mut issues = Vec::new();

    let Value::Object(fields) = server else {
        issues.push(
            ValidationIssue::error(
                IssueCode::InvalidConfigType,
                "Server configuration must be a plain object",
            )
            .at(parent),
        );
        return issues;
    };

    if let Some(command) = fields.get("command") {
        if !command.is_string() {
            issues.push(
                ValidationIssue::error(IssueCode::MissingCommand, "Server command must be a string")
                    .at(format!("{parent}.command")),
            );
        }
    }

    match fields.get("args") {
        None => {}
        Some(Value::Array(args)) => {
            for (index, arg) in args.iter().enumerate() {
                if !arg.is_string() {
                    issues.push(
                        ValidationIssue::error(
                            IssueCode::InvalidArgType,
                            format!("Argument at index {index} must be a string"),
                        )
                        .at(format!("{parent}.args[{index}]"))
                        .with_value(arg.clone()),
                    );
                }
            }
        }
        Some(_) => issues.push(
            ValidationIssue::error(IssueCode::InvalidArgsType, "Server arguments must be an array")
                .at(format!("{parent}.args")),
        ),
    }

    match fields.get("env") {
        None | Some(Value::Null) => {}
        Some(Value::Object(env)) => {
            for (key, value) in env {
                if !value.is_string() {
                    issues.push(
                        ValidationIssue::error(
                            IssueCode::InvalidEnvValueType,
                            format!("Environment variable \"{key}\" value must be a string"),
                        )
                        .at(format!("{parent}.env.{key}"))
                        .with_value(value.clone()),
                    );
                }
            }
        }
        Some(_) => issues.push(
            ValidationIssue::error(
                IssueCode::InvalidEnvType,
                "Environment variables must be a plain object",
            )
            .at(format!("{parent}.env")),
        ),
    }

    issues
}

/// Human-readable multi-section rendering of a result.
pub fn format_report(result: &ValidationResult) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    out.push_str(if result.valid {
        "validation passed"
    } else {
        "validation failed"
    });

    for (title, issues) in [
        ("errors", &result.errors),
        ("warnings", &result.warnings),
        ("info", &result.info),
    ] {
        if issues.is_empty() {
            continue;
        }
        let _ = write!(out, "\n\n{title}:");
        for issue in issues {
            let field = issue
                .field
                .as_deref()
                .map(|f| format!(" ({f})"))
                .unwrap_or_default();
            let _ = write!(out, "\n  - {}{field}", issue.message);
        }
    }
    out
}
