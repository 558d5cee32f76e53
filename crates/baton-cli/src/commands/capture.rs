use super::{Context, EXIT_SUCCESS};
use baton_core::CoreError;
use baton_schema::{HostConfiguration, Profile, Validator};
use tracing::warn;

/// Build a profile from the document's server map and store it, warning about
/// anything the validator flags and any server keys a profile cannot keep.
/// Invalid profiles are stored too; switching to them is what fails.
pub(super) fn save(
    ctx: &Context,
    name: &str,
    description: Option<&str>,
    doc: &HostConfiguration,
) -> Result<Profile, CoreError> {
    for (server, key) in doc.unsupported_server_fields() {
        warn!("server '{server}': '{key}' is not kept in profiles and is dropped");
    }
    let mut profile = Profile::new(name, doc.servers()?);
    if let Some(d) = description {
        profile = profile.with_description(d);
    }
    let report = Validator::default().validate_profile(&profile);
    for issue in report.errors.iter().chain(&report.warnings) {
        warn!("profile '{name}': {issue}");
    }
    Ok(ctx.profiles()?.create(profile)?)
}

pub fn run(ctx: &Context, name: &str, description: Option<&str>) -> Result<u8, CoreError> {
    let store = ctx.store()?;
    let profile = save(ctx, name, description, &store.read()?)?;

    ctx.emit(profile, |p| {
        println!(
            "captured {} server(s) from {} as '{}' ({})",
            p.servers.len(),
            store.config_path().display(),
            p.name,
            p.id
        );
    })?;
    Ok(EXIT_SUCCESS)
}
