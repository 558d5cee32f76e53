use super::EXIT_SUCCESS;
use baton_core::CoreError;
use clap::CommandFactory;
use std::path::Path;

fn render(cmd: clap::Command, path: &Path) -> Result<(), CoreError> {
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// One page for `baton` and one per subcommand.
pub fn run<C: CommandFactory>(dir: &Path) -> Result<u8, CoreError> {
    std::fs::create_dir_all(dir)?;
    let cmd = C::command();
    render(cmd.clone(), &dir.join("baton.1"))?;
    for sub in cmd.get_subcommands() {
        render(sub.clone(), &dir.join(format!("baton-{}.1", sub.get_name())))?;
    }
    println!("man pages written to {}", dir.display());
    Ok(EXIT_SUCCESS)
}
