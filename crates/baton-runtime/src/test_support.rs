//! Real processes with a unique name, for the pgrep based backends.

use std::fs;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Whether `pgrep` can be run here at all.
pub(crate) fn have_pgrep() -> bool {
    Command::new("pgrep")
        .args(["-x", "baton-none"])
        .stdout(Stdio::null())
        .status()
        .is_ok()
}

/// A process name no other test or system process uses, short enough to
/// survive the kernel's 15 byte comm truncation.
pub(crate) fn unique_name(tag: &str) -> String {
    format!("bt{tag}{}", std::process::id() % 1_000_000)
}

/// Copy `sleep` into `dir` as `name` and start `count` instances of it.
pub(crate) fn spawn_named(dir: &Path, name: &str, count: usize) -> Vec<Child> {
    let sleep = ["/bin/sleep", "/usr/bin/sleep"]
        .into_iter()
        .find(|p| Path::new(p).is_file())
        .expect("no sleep binary");
    let exe = dir.join(name);
    fs::copy(sleep, &exe).unwrap();
    (0..count)
        .map(|_| {
            Command::new(&exe)
                .arg("30")
                .stdin(Stdio::null())
                .spawn()
                .unwrap()
        })
        .collect()
}

/// Kill whatever survived and reap every child.
pub(crate) fn reap(children: Vec<Child>) {
    for mut child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}
