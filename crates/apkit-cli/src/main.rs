//! apkit - inspect and install Android packages

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use apkit_cli::cmd;
use apkit_cli::cmd::info::InfoOptions;
use apkit_cli::cmd::install::InstallArgs;
use apkit_cli::{Cli, Commands, Context, ui};

const LOG_ENV: &str = "APKIT_LOG";

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Commands::Info {
            file,
            json,
            no_recursion,
            only,
            skip_broken,
        } => {
            let opts = InfoOptions {
                json,
                no_recursion,
                only,
                skip_broken,
            };
            cmd::info::info(&ctx, &file, &opts)
        }
        Commands::Install {
            file,
            serial,
            no_check,
            reinstall,
            downgrade,
            installer,
            originating_uri,
            skip_broken,
            json,
        } => {
            let args = InstallArgs {
                serial,
                no_check,
                reinstall,
                downgrade,
                installer,
                originating_uri,
                skip_broken,
                json,
            };
            cmd::install::install(&ctx, &file, &args)
        }
        Commands::Uninstall { package, serial } => cmd::uninstall::uninstall(&ctx, &package, serial),
        Commands::Extract {
            file,
            output,
            entries,
        } => cmd::extract::extract(&ctx, &file, &output, &entries),
        Commands::Rename { file, template } => cmd::rename::rename(&ctx, &file, &template),
        Commands::Devices { json } => cmd::devices::devices(&ctx, json),
        Commands::Hash { files, md5 } => cmd::hash::hash(&files, md5),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
