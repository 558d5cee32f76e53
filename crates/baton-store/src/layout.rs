use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

const PROFILES_FILE: &str = "profiles.json";
const ACTIVE_MARKER_FILE: &str = "active";
const LOCK_FILE: &str = ".lock";

/// Directory layout for Baton's own data: the profile set, the
/// active-profile marker and the switch lock.
///
/// The host configuration and its backups live elsewhere; see
/// [`ConfigStore`](crate::ConfigStore).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn profiles_file(&self) -> PathBuf {
        self.root.join(PROFILES_FILE)
    }

    #[inline]
    pub fn active_marker(&self) -> PathBuf {
        self.root.join(ACTIVE_MARKER_FILE)
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/tmp/baton-test");
        assert_eq!(
            layout.profiles_file(),
            PathBuf::from("/tmp/baton-test/profiles.json")
        );
        assert_eq!(
            layout.active_marker(),
            PathBuf::from("/tmp/baton-test/active")
        );
        assert_eq!(layout.lock_file(), PathBuf::from("/tmp/baton-test/.lock"));
    }

    #[test]
    fn initialize_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("data"));
        layout.initialize().unwrap();
        assert!(layout.root().is_dir());
        layout.initialize().unwrap();
    }
}
