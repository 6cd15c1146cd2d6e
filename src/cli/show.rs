//! Configuration display command

use std::path::Path;

use crate::config::{AuditConfig, AuditModels};

/// Handle `config`: print the effective configuration
pub fn handle_config_command(config_file: &Path, config: &AuditConfig) {
    let settings = &config.audit;

    println!("audit-trail Configuration");
    println!("=========================");
    if config_file.exists() {
        println!("Config file: {}", config_file.display());
    } else {
        println!("Config file: {} (not found, using defaults)", config_file.display());
    }
    println!();
    println!("Settings:");
    println!("  Enabled:              {}", settings.enabled);
    println!("  Database alias:       {}", settings.database_alias);
    println!("  Async delivery:       {}", settings.async_delivery);
    match &settings.audit_models {
        AuditModels::All => println!("  Audited entities:     all"),
        AuditModels::Only(names) => {
            println!("  Audited entities:     {}", names.join(", "))
        }
    }
    if !settings.not_audit_models.is_empty() {
        println!(
            "  Excluded entities:    {}",
            settings.not_audit_models.join(", ")
        );
    }
    println!(
        "  Capture:              http={} commands={} tasks={}",
        settings.capture_http, settings.capture_commands, settings.capture_tasks
    );
    println!(
        "  Raise if unavailable: {}",
        settings.raise_error_if_unavailable
    );
    println!("  Fallback to default:  {}", settings.fallback_to_default);
    println!(
        "  Retry:                {} attempts, {}ms base, {}ms max",
        settings.retry.max_retries, settings.retry.base_delay_ms, settings.retry.max_delay_ms
    );
    println!();
    println!("Backends (default: {}):", config.default_backend);
    if config.backends.is_empty() {
        println!("  (none configured)");
    }
    for (alias, backend) in &config.backends {
        println!("  {}: {}", alias, redact_url(&backend.url));
    }
}

/// Hide the password part of a connection URL
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:****@{}", scheme, user, host),
        None => url.to_string(),
    }
}
