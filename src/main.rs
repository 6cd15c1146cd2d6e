use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use audit_trail::cli::{
    handle_check_command, handle_config_command, handle_migrate_command, MigrateArgs,
};
use audit_trail::config::{AuditConfig, AuditPaths};
use audit_trail::context::{run_command, CommandInvocation};
use audit_trail::logging;

#[derive(Parser)]
#[command(
    name = "audit-trail",
    version,
    about = "Maintenance tool for change-capture audit log tables",
    long_about = "audit-trail inspects and maintains the per-entity audit log \
                  tables written by the audit engine: it checks that the \
                  configured backend is reachable and migrates existing log \
                  tables to newer schema revisions."
)]
struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, global = true, env = "AUDIT_TRAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate audit log tables to fix timestamp accuracy for async logging
    #[command(name = "migrate-timestamps")]
    MigrateTimestamps(MigrateArgs),

    /// Resolve and probe the audit backend, then list its log tables
    Check {
        /// Backend alias to check (defaults to the configured audit alias)
        #[arg(long)]
        database: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let (config_file, config) = match &cli.config {
        Some(path) => (path.clone(), AuditConfig::load(path)?),
        None => {
            let paths = AuditPaths::new()?;
            (paths.config_file(), AuditConfig::load_or_default(&paths)?)
        }
    };

    match cli.command {
        Some(Commands::MigrateTimestamps(args)) => {
            let invocation = args.invocation();
            run_command(
                &config.audit,
                &invocation,
                handle_migrate_command(&config, args),
            )
            .await?;
        }
        Some(Commands::Check { database }) => {
            let invocation = CommandInvocation::new(
                "check",
                "audit_trail::cli::check::handle_check_command",
            )
            .option("database", database.as_ref());
            run_command(
                &config.audit,
                &invocation,
                handle_check_command(&config, database),
            )
            .await?;
        }
        Some(Commands::Config) => {
            handle_config_command(&config_file, &config);
        }
        None => {
            println!("audit-trail - Change-capture audit log maintenance");
            println!();
            println!("Run 'audit-trail --help' for usage information.");
        }
    }

    Ok(())
}
