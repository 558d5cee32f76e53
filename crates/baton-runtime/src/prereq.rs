use crate::exec::output_within;
use std::fmt;
use std::process::Command;
use std::time::Duration;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    output_within(Command::new("which").arg(name), LOOKUP_TIMEOUT)
        .map(|o| o.status.success())
        .unwrap_or(false)
}

const PGREP: MissingPrereq = MissingPrereq {
    name: "pgrep",
    purpose: "detecting whether the application is running",
    install_hint: "part of procps (Linux) or the base system (macOS)",
};

fn macos_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists("pgrep") {
        missing.push(PGREP);
    }
    if !command_exists("pkill") {
        missing.push(MissingPrereq {
            name: "pkill",
            purpose: "force quitting an unresponsive application",
            install_hint: "part of the macOS base system",
        });
    }
    if !command_exists("osascript") {
        missing.push(MissingPrereq {
            name: "osascript",
            purpose: "asking the application to quit gracefully",
            install_hint: "part of the macOS base system",
        });
    }
    if !command_exists("open") {
        missing.push(MissingPrereq {
            name: "open",
            purpose: "launching the application bundle",
            install_hint: "part of the macOS base system",
        });
    }
    missing
}

fn unix_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists("pgrep") {
        missing.push(PGREP);
    }
    if !command_exists("ps") {
        missing.push(MissingPrereq {
            name: "ps",
            purpose: "reporting the running process name",
            install_hint: "apt install procps | dnf install procps-ng | pacman -S procps-ng",
        });
    }
    missing
}

/// Check the external tools a backend shells out to.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_prereqs(backend: &str) -> Vec<MissingPrereq> {
    match backend {
        "macos" => macos_prereqs(),
        "unix" => unix_prereqs(),
        _ => Vec::new(),
    }
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nbaton needs these tools to control the host application.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "pgrep",
            purpose: "process lookup",
            install_hint: "apt install procps",
        };
        let s = format!("{m}");
        assert!(s.contains("pgrep"));
        assert!(s.contains("process lookup"));
        assert!(s.contains("apt install procps"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![
            MissingPrereq {
                name: "pgrep",
                purpose: "lookup",
                install_hint: "apt install procps",
            },
            MissingPrereq {
                name: "osascript",
                purpose: "quit",
                install_hint: "macOS only",
            },
        ];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("pgrep"));
        assert!(output.contains("osascript"));
    }

    #[test]
    fn mock_backend_has_no_prereqs() {
        assert!(check_prereqs("mock").is_empty());
    }
}
