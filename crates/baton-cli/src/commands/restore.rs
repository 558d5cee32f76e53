use super::{spin_fail, spin_ok, Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_runtime::RestartReport;
use baton_store::BackupRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoreReport {
    restored_from: PathBuf,
    pre_restore: BackupRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<RestartReport>,
}

/// A bare file name refers to the backup directory.
fn resolve(backup_dir: &Path, backup: &Path) -> PathBuf {
    if backup.components().count() == 1 && !backup.exists() {
        backup_dir.join(backup)
    } else {
        backup.to_path_buf()
    }
}

pub fn run(ctx: &Context, backup: &Path, restart: bool) -> Result<u8, CoreError> {
    let switcher = ctx.switcher()?;
    let path = resolve(switcher.store().backup_dir(), backup);
    let pre_restore = switcher.restore(&path)?;

    let restart = if restart {
        let pb = ctx.spinner(&format!("restarting {}...", switcher.controller().app()));
        match switcher.restart() {
            Ok(r) => {
                spin_ok(pb.as_ref(), &r.message());
                Some(r)
            }
            Err(e) => {
                spin_fail(pb.as_ref(), "restart failed");
                return Err(e);
            }
        }
    } else {
        None
    };

    let report = RestoreReport {
        restored_from: path,
        pre_restore,
        restart,
    };
    ctx.emit(report, |r| {
        println!("restored {}", r.restored_from.display());
        println!("previous configuration saved to {}", r.pre_restore.backup_path.display());
    })?;
    Ok(EXIT_SUCCESS)
}
