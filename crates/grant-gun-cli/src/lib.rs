mod airtable;
mod config;
mod hcb;
mod opener;
mod prompt;
mod show;
mod workflow;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory as _, Parser, Subcommand};

use crate::config::Config;
use crate::show::Palette;
use crate::workflow::Workflow;

#[derive(Parser)]
#[command(
    name = "grant-gun",
    about = "Reconcile grant budgets against HCB disbursements and open the outstanding transfers"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Config file path. Defaults to grant-gun.toml or .grant-gun.toml in the current directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Review grant budgets and open the outstanding transfers (default)
    Grants,
    /// Review program-level payouts
    Programs {
        /// Only programs whose HCB URL or name contains this text
        #[arg(short, long)]
        program: Option<String>,
    },
    /// Check the Airtable and HCB credentials and exit
    Auth,
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grant_gun=info,grant_gun_cli=info,grant_gun_auth=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let config = Config::load(args.config.as_deref())?;
    let palette = Palette::detect();

    match args.command.unwrap_or(Commands::Grants) {
        Commands::Auth => workflow::check_auth(&config, &palette).await,
        Commands::Grants => workflow::run(&Workflow::Grants, &config, palette).await,
        Commands::Programs { program } => {
            workflow::run(&Workflow::Programs { search: program }, &config, palette).await
        }
    }
}
