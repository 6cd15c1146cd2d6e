//! Timestamp migration command
//!
//! Previews or applies the `created_at` precision upgrade on every log table
//! of one backend.

use clap::Args;

use crate::backend::{BackendHandle, BackendRegistry};
use crate::config::AuditConfig;
use crate::context::CommandInvocation;
use crate::error::AuditResult;
use crate::maintenance::TimestampMigration;

/// Arguments of `migrate-timestamps`
#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Show what would be changed without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Apply the changes
    #[arg(long)]
    pub force: bool,

    /// Backend alias to migrate (defaults to the configured audit alias)
    #[arg(long)]
    pub database: Option<String>,
}

impl MigrateArgs {
    /// Describe this invocation for the command context
    pub fn invocation(&self) -> CommandInvocation {
        CommandInvocation::new(
            "migrate-timestamps",
            "audit_trail::cli::migrate::handle_migrate_command",
        )
        .option("dry_run", Some(self.dry_run))
        .option("force", Some(self.force))
        .option("database", self.database.as_ref())
    }
}

/// Pick the backend for a maintenance command
///
/// An unknown alias falls back to the default backend only when
/// `fallback_to_default` is set; otherwise the command fails.
pub fn select_backend(
    registry: &BackendRegistry,
    alias: &str,
    fallback_to_default: bool,
) -> AuditResult<BackendHandle> {
    match registry.handle(alias) {
        Ok(handle) => Ok(handle),
        Err(_) if fallback_to_default && alias != registry.default_alias() => {
            println!(
                "Database '{}' not found, falling back to '{}'",
                alias,
                registry.default_alias()
            );
            registry.handle(registry.default_alias())
        }
        Err(err) => Err(err),
    }
}

/// Handle `migrate-timestamps`
pub async fn handle_migrate_command(config: &AuditConfig, args: MigrateArgs) -> AuditResult<()> {
    let registry = BackendRegistry::from_config(config);
    let alias = args
        .database
        .clone()
        .unwrap_or_else(|| config.audit.database_alias.clone());

    if args.dry_run {
        println!("DRY RUN MODE - No changes will be made");
    }

    let handle = select_backend(&registry, &alias, config.audit.fallback_to_default)?;
    println!(
        "Using database '{}' ({})",
        handle.alias(),
        handle.dialect()
    );

    let plan = TimestampMigration::plan(&handle).await?;
    if plan.is_empty() {
        println!("No audit log tables found to migrate");
        return Ok(());
    }

    let count = plan.steps().len();
    println!("Found {} audit log tables", count);
    for step in plan.steps() {
        match &step.statement {
            Some(statement) => println!("  {}: {}", step.table, statement),
            None => println!("  {}: no schema change needed", step.table),
        }
    }

    if args.dry_run {
        println!();
        println!("DRY RUN: Would migrate {} tables", count);
        return Ok(());
    }

    if !args.force {
        println!();
        println!("Run with --force to apply these changes.");
        return Ok(());
    }

    let altered = plan.apply(&handle).await?;
    println!();
    println!(
        "Migration complete: {} of {} tables altered",
        altered, count
    );

    Ok(())
}
