//! Entry-point wrappers
//!
//! Each supported kind of unit of work has a runner that builds its
//! [`RequestContext`] and executes the work inside a carrier scope, honouring
//! the matching `capture_*` toggle.

use std::collections::BTreeMap;
use std::future::Future;

use super::{carrier, RequestContext};
use crate::config::AuditSettings;

/// Framework options never recorded as command arguments
const IGNORED_COMMAND_OPTIONS: &[&str] = &[
    "settings",
    "pythonpath",
    "traceback",
    "no_color",
    "force_color",
    "skip_checks",
    "verbosity",
];

/// Entry-point metadata supplied by the request dispatcher
#[derive(Debug, Clone, Default)]
pub struct HttpRequestMeta {
    pub path: String,
    pub route: Option<String>,
    pub method: String,
    /// Peer address of the connection
    pub remote_addr: Option<String>,
    /// Raw `X-Forwarded-For` header
    pub forwarded_for: Option<String>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_agent: Option<String>,
}

/// An operator-invoked command and its parsed options
#[derive(Debug, Clone, Default)]
pub struct CommandInvocation {
    /// Short command name, e.g. `migrate-timestamps`
    pub name: String,
    /// Fully-qualified handler identity
    pub handler: String,
    /// Option name to rendered value; `None` for options left unset
    pub options: BTreeMap<String, Option<String>>,
}

impl CommandInvocation {
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        self.options
            .insert(key.into(), value.map(|v| v.to_string()));
        self
    }
}

/// Resolve the client address, preferring the first forwarded hop
pub fn client_ip(forwarded_for: Option<&str>, remote_addr: Option<&str>) -> Option<String> {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or(remote_addr)
        .map(str::to_string)
}

/// Render command options as `key=value` pairs
///
/// Framework options and unset options are dropped; `None` when nothing is left.
pub fn format_command_args(options: &BTreeMap<String, Option<String>>) -> Option<String> {
    let args: Vec<String> = options
        .iter()
        .filter(|(key, _)| !IGNORED_COMMAND_OPTIONS.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{}={}", key, v)))
        .collect();

    if args.is_empty() {
        None
    } else {
        Some(args.join(" "))
    }
}

/// Run an HTTP handler as one unit of work
pub async fn run_http<F>(settings: &AuditSettings, meta: HttpRequestMeta, fut: F) -> F::Output
where
    F: Future,
{
    if settings.capture_http {
        carrier::scope(RequestContext::http(meta), fut).await
    } else {
        fut.await
    }
}

/// Run an operator command as one unit of work
pub async fn run_command<F>(
    settings: &AuditSettings,
    invocation: &CommandInvocation,
    fut: F,
) -> F::Output
where
    F: Future,
{
    if settings.capture_commands {
        carrier::scope(RequestContext::command(invocation), fut).await
    } else {
        fut.await
    }
}

/// Run a queued task as one unit of work
///
/// `audit_exempt` tasks never get a context, so the audit delivery task
/// cannot show up as the trigger of its own writes.
pub async fn run_task<F>(
    settings: &AuditSettings,
    task_name: &str,
    audit_exempt: bool,
    fut: F,
) -> F::Output
where
    F: Future,
{
    if settings.capture_tasks && !audit_exempt {
        carrier::scope(RequestContext::task(task_name), fut).await
    } else {
        fut.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{current, EntryPoint};

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        assert_eq!(
            client_ip(Some("203.0.113.7, 10.0.0.1"), Some("10.0.0.1")),
            Some("203.0.113.7".to_string())
        );
        assert_eq!(
            client_ip(None, Some("10.0.0.1")),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(client_ip(Some(" "), None), None);
    }

    #[test]
    fn test_command_args_filter_framework_options() {
        let invocation = CommandInvocation::new("rebuild", "ops::rebuild::Command")
            .option("my_option", Some("test_value"))
            .option("flag", Some(true))
            .option("verbosity", Some(1))
            .option("unset", None::<String>);

        let args = format_command_args(&invocation.options).unwrap();
        assert!(args.contains("my_option=test_value"));
        assert!(args.contains("flag=true"));
        assert!(!args.contains("verbosity"));
        assert!(!args.contains("unset"));
    }

    #[test]
    fn test_command_args_empty() {
        let invocation = CommandInvocation::new("noop", "ops::noop::Command")
            .option("verbosity", Some(2));
        assert!(format_command_args(&invocation.options).is_none());
    }

    #[tokio::test]
    async fn test_run_command_sets_and_clears_context() {
        let settings = AuditSettings::default();
        let invocation = CommandInvocation::new("rebuild", "ops::rebuild::Command");

        let seen = run_command(&settings, &invocation, async { current() }).await;

        let ctx = seen.unwrap();
        assert_eq!(ctx.entry_point, EntryPoint::ManagementCommand);
        assert_eq!(ctx.path.as_deref(), Some("rebuild"));
        assert_eq!(ctx.route.as_deref(), Some("ops::rebuild::Command"));
        assert_eq!(ctx.method.as_deref(), Some("execute"));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_run_command_clears_context_on_error() {
        let settings = AuditSettings::default();
        let invocation = CommandInvocation::new("broken", "ops::broken::Command");

        let result: Result<(), String> =
            run_command(&settings, &invocation, async { Err("Test error".to_string()) }).await;

        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_capture_toggle_off() {
        let settings = AuditSettings {
            capture_http: false,
            ..AuditSettings::default()
        };
        let meta = HttpRequestMeta {
            path: "/x".into(),
            method: "GET".into(),
            ..HttpRequestMeta::default()
        };

        let seen = run_http(&settings, meta, async { current() }).await;
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn test_exempt_task_gets_no_context() {
        let settings = AuditSettings::default();

        let regular = run_task(&settings, "shop.tasks.restock", false, async { current() }).await;
        let exempt = run_task(&settings, "audit_trail.insert_log_async", true, async {
            current()
        })
        .await;

        assert_eq!(regular.unwrap().entry_point, EntryPoint::QueueTask);
        assert!(exempt.is_none());
    }
}
