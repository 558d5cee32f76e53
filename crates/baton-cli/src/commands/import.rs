use super::capture::save;
use super::{Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_schema::HostConfiguration;
use std::path::Path;

/// Import from any JSON document with an `mcpServers` map: an exported
/// profile or a host configuration file.
pub fn run(
    ctx: &Context,
    file: &Path,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<u8, CoreError> {
    let content = std::fs::read_to_string(file)?;
    let doc = HostConfiguration::parse(&content)?;

    let name = name
        .map(str::to_owned)
        .or_else(|| {
            doc.get("name")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| {
            file.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    let description = description.or_else(|| doc.get("description").and_then(|v| v.as_str()));

    let profile = save(ctx, &name, description, &doc)?;
    ctx.emit(profile, |p| {
        println!(
            "imported '{}' ({}) with {} server(s)",
            p.name,
            p.id,
            p.servers.len()
        );
    })?;
    Ok(EXIT_SUCCESS)
}
