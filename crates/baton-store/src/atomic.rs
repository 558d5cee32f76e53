use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const VERIFY_ATTEMPTS: u32 = 3;

/// Write `content` to `dest` so that readers observe either the old file or
/// the complete new one.
///
/// The bytes go to a temporary sibling, are synced and read back for
/// comparison (rewriting on mismatch up to three times), and only then renamed
/// over `dest`. On any error the temporary file is dropped, which removes it,
/// and `dest` is untouched.
pub fn write_atomic(dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    write_verified(dest, content, Mode::Replace, |p| fs::read(p))
}

/// Like [`write_atomic`], but fails with `AlreadyExists` instead of replacing
/// a file that appeared at `dest` in the meantime.
pub fn write_atomic_new(dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    write_verified(dest, content, Mode::CreateNew, |p| fs::read(p))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Replace,
    CreateNew,
}

fn write_verified(
    dest: &Path,
    content: &[u8],
    mode: Mode,
    mut read_back: impl FnMut(&Path) -> io::Result<Vec<u8>>,
) -> Result<(), StoreError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;

    let mut attempt = 1;
    loop {
        match read_back(tmp.path()) {
            Ok(written) if written == content => break,
            Ok(written) => warn!(
                "verification mismatch for {} (attempt {attempt}): {} bytes on disk, {} expected",
                dest.display(),
                written.len(),
                content.len()
            ),
            Err(e) => warn!(
                "verification read failed for {} (attempt {attempt}): {e}",
                dest.display()
            ),
        }
        if attempt >= VERIFY_ATTEMPTS {
            return Err(StoreError::VerifyFailed {
                path: dest.to_path_buf(),
                attempts: attempt,
            });
        }
        attempt += 1;
        let file = tmp.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    match mode {
        Mode::Replace => tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?,
        Mode::CreateNew => tmp
            .persist_noclobber(dest)
            .map_err(|e| StoreError::Io(e.error))?,
    };
    fsync_dir(dir)?;
    debug!("atomically wrote {} ({} bytes)", dest.display(), content.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cfg.json");
        write_atomic(&dest, b"{}\n").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"{}\n");
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cfg.json");
        fs::write(&dest, b"old").unwrap();
        write_atomic(&dest, b"new content").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new content");
    }

    #[test]
    fn creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b").join("cfg.json");
        write_atomic(&dest, b"x").unwrap();
        assert!(dest.exists());
    }

    #[test]
    fn leaves_no_temporary_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cfg.json");
        write_atomic(&dest, b"1").unwrap();
        write_atomic(&dest, b"2").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("cfg.json")]);
    }

    #[test]
    fn failed_rename_keeps_original() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let dest = dir.path().join("occupied");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("keep"), b"k").unwrap();

        assert!(write_atomic(&dest, b"data").is_err());
        assert!(dest.is_dir());
        assert_eq!(fs::read(dest.join("keep")).unwrap(), b"k");
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn persistent_mismatch_fails_without_touching_dest() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cfg.json");
        fs::write(&dest, b"original").unwrap();

        let mut reads = 0;
        let err = write_verified(&dest, b"new", Mode::Replace, |_| {
            reads += 1;
            Ok(b"garbled".to_vec())
        })
        .unwrap_err();

        assert!(matches!(err, StoreError::VerifyFailed { attempts: 3, .. }));
        assert_eq!(reads, 3);
        assert_eq!(fs::read(&dest).unwrap(), b"original");
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn transient_mismatch_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("cfg.json");

        let mut reads = 0;
        write_verified(&dest, b"new", Mode::Replace, |path| {
            reads += 1;
            if reads == 1 {
                Err(io::Error::new(io::ErrorKind::Interrupted, "flaky read"))
            } else {
                fs::read(path)
            }
        })
        .unwrap();

        assert_eq!(reads, 2);
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn create_new_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("backup.json");
        fs::write(&dest, b"first").unwrap();

        let err = write_atomic_new(&dest, b"second").unwrap_err();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == io::ErrorKind::AlreadyExists));
        assert_eq!(fs::read(&dest).unwrap(), b"first");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
