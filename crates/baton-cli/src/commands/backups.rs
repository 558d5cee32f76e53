use super::{format_time, Context, EXIT_SUCCESS};
use baton_core::CoreError;

pub fn run(ctx: &Context) -> Result<u8, CoreError> {
    let records = ctx.store()?.backup_records()?;
    ctx.emit(records, |records| {
        if records.is_empty() {
            println!("no backups found");
            return;
        }
        println!("{:<17} {:<15} {:>8}  FILE", "TIME", "REASON", "BYTES");
        for r in records {
            let file = r
                .backup_path
                .file_name()
                .map_or_else(|| r.backup_path.display().to_string(), |n| {
                    n.to_string_lossy().into_owned()
                });
            let size = if r.source_existed {
                r.size.to_string()
            } else {
                "-".to_owned()
            };
            println!(
                "{:<17} {:<15} {:>8}  {file}",
                format_time(&r.timestamp),
                r.reason,
                size
            );
        }
    })?;
    Ok(EXIT_SUCCESS)
}
