//! Causal context for audited mutations
//!
//! A [`RequestContext`] describes who or what triggered the current unit of
//! work: an inbound HTTP request, an operator command, or a queued task. It
//! lives in a task-local carrier for the duration of that unit of work and is
//! copied into every change event captured inside it.
//!
//! # Example
//!
//! ```rust,ignore
//! use audit_trail::context::{self, RequestContext};
//!
//! context::scope(RequestContext::task("billing.tasks.close_period"), async {
//!     // mutations audited here carry entry_point = "celery_task"
//!     assert!(context::current().is_some());
//! })
//! .await;
//!
//! assert!(context::current().is_none());
//! ```

mod carrier;
mod entry;

use serde::{Deserialize, Serialize};

pub use carrier::{clear, current, propagate, scope, set, sync_scope};
pub use entry::{
    client_ip, format_command_args, run_command, run_http, run_task, CommandInvocation,
    HttpRequestMeta,
};

/// Kind of unit of work that triggered a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EntryPoint {
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "management_command")]
    ManagementCommand,
    /// Stored as `celery_task` so existing log tables keep one vocabulary
    #[serde(rename = "celery_task")]
    QueueTask,
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
}

impl EntryPoint {
    /// Value written to the `entry_point` column
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Http => "http",
            EntryPoint::ManagementCommand => "management_command",
            EntryPoint::QueueTask => "celery_task",
            EntryPoint::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Causal metadata for one logical unit of work
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub entry_point: EntryPoint,

    /// Resource path or command identifier
    pub path: Option<String>,

    /// Named route or fully-qualified handler identity
    pub route: Option<String>,

    /// HTTP verb or handler method name
    pub method: Option<String>,

    pub ip: Option<String>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,

    /// Free text: the user agent for HTTP, the arguments for commands,
    /// task metadata for queued tasks
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Context used when a mutation happens outside any unit of work
    pub fn unspecified() -> Self {
        Self::default()
    }

    /// Build the context of an inbound HTTP request
    pub fn http(meta: HttpRequestMeta) -> Self {
        let ip = client_ip(meta.forwarded_for.as_deref(), meta.remote_addr.as_deref());
        Self {
            entry_point: EntryPoint::Http,
            path: Some(meta.path),
            route: meta.route,
            method: Some(meta.method.to_uppercase()),
            ip,
            user_id: meta.user_id,
            user_name: meta.user_name,
            user_agent: meta.user_agent,
        }
    }

    /// Build the context of an operator-invoked command
    pub fn command(invocation: &CommandInvocation) -> Self {
        Self {
            entry_point: EntryPoint::ManagementCommand,
            path: Some(invocation.name.clone()),
            route: Some(invocation.handler.clone()),
            method: Some("execute".to_string()),
            ip: None,
            user_id: None,
            user_name: os_user(),
            user_agent: format_command_args(&invocation.options),
        }
    }

    /// Build the context of a queued task about to run
    pub fn task(task_name: &str) -> Self {
        let short_name = task_name.rsplit('.').next().unwrap_or(task_name);
        Self {
            entry_point: EntryPoint::QueueTask,
            path: Some(short_name.to_string()),
            route: Some(task_name.to_string()),
            method: Some("run".to_string()),
            ip: None,
            user_id: None,
            user_name: os_user(),
            user_agent: Some(format!("task={}", task_name)),
        }
    }
}

/// Login name of the operating-system user running this process
fn os_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_wire_names() {
        assert_eq!(EntryPoint::Http.to_string(), "http");
        assert_eq!(EntryPoint::ManagementCommand.to_string(), "management_command");
        assert_eq!(EntryPoint::QueueTask.to_string(), "celery_task");
        assert_eq!(
            serde_json::to_string(&EntryPoint::QueueTask).unwrap(),
            "\"celery_task\""
        );
    }

    #[test]
    fn test_task_context() {
        let ctx = RequestContext::task("billing.tasks.close_period");

        assert_eq!(ctx.entry_point, EntryPoint::QueueTask);
        assert_eq!(ctx.path.as_deref(), Some("close_period"));
        assert_eq!(ctx.route.as_deref(), Some("billing.tasks.close_period"));
        assert_eq!(ctx.method.as_deref(), Some("run"));
        assert_eq!(
            ctx.user_agent.as_deref(),
            Some("task=billing.tasks.close_period")
        );
    }

    #[test]
    fn test_http_context() {
        let ctx = RequestContext::http(HttpRequestMeta {
            path: "/api/widgets/create/".into(),
            route: Some("api_widgets_create".into()),
            method: "post".into(),
            remote_addr: Some("10.0.0.9".into()),
            forwarded_for: None,
            user_id: Some(7),
            user_name: Some("u1".into()),
            user_agent: Some("pytest-agent".into()),
        });

        assert_eq!(ctx.entry_point, EntryPoint::Http);
        assert_eq!(ctx.method.as_deref(), Some("POST"));
        assert_eq!(ctx.ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(ctx.user_id, Some(7));
    }

    #[test]
    fn test_unspecified_is_all_absent() {
        let ctx = RequestContext::unspecified();
        assert_eq!(ctx.entry_point, EntryPoint::Unspecified);
        assert!(ctx.path.is_none() && ctx.route.is_none() && ctx.user_id.is_none());
    }
}
