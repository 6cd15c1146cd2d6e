//! Backend resolution with fallback
//!
//! Resolution runs for every write. Two independent checks are made: the alias
//! must be configured, and the backend must answer a probe. Each failure is
//! handled by the same three-way policy: raise, fall back to the default
//! alias, or skip the write.

use std::time::Duration;

use tracing::{error, warn};

use super::registry::{BackendHandle, BackendRegistry};
use crate::config::AuditSettings;
use crate::error::{AuditError, AuditResult};

/// The slice of settings that drives resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    pub raise_if_unavailable: bool,
    pub fallback_to_default: bool,
    pub probe_timeout: Duration,
}

impl From<&AuditSettings> for ResolvePolicy {
    fn from(settings: &AuditSettings) -> Self {
        Self {
            raise_if_unavailable: settings.raise_error_if_unavailable,
            fallback_to_default: settings.fallback_to_default,
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
        }
    }
}

impl BackendRegistry {
    /// Resolve `alias` to a live backend
    ///
    /// `Ok(None)` means the write should be skipped. Only
    /// [`AuditError::BackendUnavailable`] is returned as an error.
    pub async fn resolve(
        &self,
        alias: &str,
        policy: &ResolvePolicy,
    ) -> AuditResult<Option<BackendHandle>> {
        let handle = match self.handle(alias) {
            Ok(handle) => handle,
            Err(err) => {
                if policy.raise_if_unavailable {
                    return Err(unavailable(alias, err));
                }
                if !policy.fallback_to_default {
                    warn!(alias, error = %err, "audit backend is not configured, skipping audit");
                    return Ok(None);
                }

                warn!(
                    alias,
                    default = self.default_alias(),
                    error = %err,
                    "audit backend is not configured, falling back to default"
                );
                match self.handle(self.default_alias()) {
                    Ok(handle) => handle,
                    Err(err) => {
                        warn!(
                            alias = self.default_alias(),
                            error = %err,
                            "default audit backend is not configured, skipping audit"
                        );
                        return Ok(None);
                    }
                }
            }
        };

        let err = match handle.probe(policy.probe_timeout).await {
            Ok(()) => return Ok(Some(handle)),
            Err(err) => err,
        };

        if policy.raise_if_unavailable {
            return Err(unavailable(handle.alias(), err));
        }

        if !policy.fallback_to_default || handle.alias() == self.default_alias() {
            warn!(
                alias = handle.alias(),
                error = %err,
                "audit backend is unreachable, skipping audit"
            );
            return Ok(None);
        }

        warn!(
            alias = handle.alias(),
            default = self.default_alias(),
            error = %err,
            "audit backend is unreachable, falling back to default"
        );

        let fallback = match self.handle(self.default_alias()) {
            Ok(fallback) => fallback,
            Err(err) => {
                error!(
                    alias = self.default_alias(),
                    error = %err,
                    "default audit backend is not configured either, audit record lost"
                );
                return Ok(None);
            }
        };

        match fallback.probe(policy.probe_timeout).await {
            Ok(()) => Ok(Some(fallback)),
            Err(err) => {
                error!(
                    alias = fallback.alias(),
                    error = %err,
                    "default audit backend is unreachable too, audit record lost"
                );
                Ok(None)
            }
        }
    }
}

fn unavailable(alias: &str, err: AuditError) -> AuditError {
    match err {
        AuditError::BackendUnavailable { .. } => err,
        other => AuditError::backend_unavailable(alias, other.to_string()),
    }
}
