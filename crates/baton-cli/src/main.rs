mod commands;

use baton_core::{install_signal_handler, Settings};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{report_error, Context, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "baton",
    version,
    about = "Switch a desktop host application between MCP server profiles"
)]
struct Cli {
    /// Settings file (defaults to $BATON_CONFIG or ~/.config/baton/config.toml).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Host configuration file, overriding the settings file.
    #[arg(long, global = true)]
    config_path: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List all profiles.
    List,
    /// Show one profile.
    Show {
        /// Profile ID or name.
        profile: String,
    },
    /// Save the servers currently in the host configuration as a new profile.
    Capture {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Import a profile from a JSON file containing an `mcpServers` map.
    Import {
        file: PathBuf,
        /// Profile name (defaults to the file's `name` field or its stem).
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a profile.
    Remove {
        /// Profile ID or name.
        profile: String,
    },
    /// Validate a profile, a configuration file, or the live host configuration.
    Validate {
        /// Profile ID or name.
        profile: Option<String>,
        /// Validate this host configuration file instead.
        #[arg(long, conflicts_with = "profile")]
        file: Option<PathBuf>,
    },
    /// Switch the host application to a profile.
    Switch {
        /// Profile ID or name.
        profile: String,
        /// Accept validation warnings without asking.
        #[arg(short, long, default_value_t = false)]
        yes: bool,
        /// Write the configuration but leave the application running as is.
        #[arg(long, default_value_t = false)]
        no_restart: bool,
    },
    /// Show the host configuration, application and active profile.
    Status,
    /// Restart the host application.
    Restart,
    /// Back up the live host configuration.
    Backup,
    /// List backups, newest first.
    Backups,
    /// Put a backup back in place.
    Restore {
        /// Backup path, or a file name inside the backup directory.
        backup: PathBuf,
        /// Restart the application afterwards.
        #[arg(long, default_value_t = false)]
        restart: bool,
    },
    /// Delete old backups.
    Prune {
        /// Backups to keep (defaults to `keep_backups` from settings).
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Run diagnostic checks on settings, configuration and tools.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BATON_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    install_signal_handler();

    let json = cli.json;
    let mut settings = match Settings::load(cli.settings.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            report_error(&e, json);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    if let Some(path) = cli.config_path {
        settings.config_path = Some(path);
    }
    let ctx = Context { settings, json };

    let needs_process = matches!(
        cli.command,
        Commands::Restart
            | Commands::Switch {
                no_restart: false,
                ..
            }
            | Commands::Restore { restart: true, .. }
    );
    if needs_process && std::env::var("BATON_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = baton_runtime::check_prereqs(&ctx.settings.backend);
        if !missing.is_empty() {
            eprintln!("error: {}", baton_runtime::format_missing(&missing));
            return ExitCode::from(EXIT_FAILURE);
        }
    }

    let result = match cli.command {
        Commands::List => commands::list::run(&ctx),
        Commands::Show { profile } => commands::show::run(&ctx, &profile),
        Commands::Capture { name, description } => {
            commands::capture::run(&ctx, &name, description.as_deref())
        }
        Commands::Import {
            file,
            name,
            description,
        } => commands::import::run(&ctx, &file, name.as_deref(), description.as_deref()),
        Commands::Remove { profile } => commands::remove::run(&ctx, &profile),
        Commands::Validate { profile, file } => {
            commands::validate::run(&ctx, profile.as_deref(), file.as_deref())
        }
        Commands::Switch {
            profile,
            yes,
            no_restart,
        } => commands::switch::run(&ctx, &profile, yes, !no_restart),
        Commands::Status => commands::status::run(&ctx),
        Commands::Restart => commands::restart::run(&ctx),
        Commands::Backup => commands::backup::run(&ctx),
        Commands::Backups => commands::backups::run(&ctx),
        Commands::Restore { backup, restart } => commands::restore::run(&ctx, &backup, restart),
        Commands::Prune { keep } => commands::prune::run(&ctx, keep),
        Commands::Doctor => commands::doctor::run(&ctx),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            report_error(&e, json);
            ExitCode::from(commands::exit_code(&e))
        }
    }
}
