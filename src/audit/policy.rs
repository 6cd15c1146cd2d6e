//! Dispatch policy
//!
//! Decides per mutation whether an entity is audited at all. Settings are
//! read fresh for every decision.
//!
//! The inclusion and exclusion lists are independent filters applied in
//! order: the global switch, then the inclusion list (when it names
//! anything), then the exclusion list, which always wins. An exclusion list
//! on its own therefore audits every entity it does not name.

use crate::config::{AuditModels, AuditSettings};

/// Whether mutations of `qualified_name` should be audited
pub fn should_audit(qualified_name: &str, settings: &AuditSettings) -> bool {
    if !settings.enabled {
        return false;
    }

    if let AuditModels::Only(included) = &settings.audit_models {
        if !included.is_empty() && !contains_name(included, qualified_name) {
            return false;
        }
    }

    !contains_name(&settings.not_audit_models, qualified_name)
}

fn contains_name(names: &[String], qualified_name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(qualified_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(include: Option<&[&str]>, exclude: &[&str]) -> AuditSettings {
        AuditSettings {
            audit_models: match include {
                Some(list) => AuditModels::Only(list.iter().map(|s| s.to_string()).collect()),
                None => AuditModels::All,
            },
            not_audit_models: exclude.iter().map(|s| s.to_string()).collect(),
            ..AuditSettings::default()
        }
    }

    #[test]
    fn test_defaults_audit_everything() {
        assert!(should_audit("shop.widget", &AuditSettings::default()));
    }

    #[test]
    fn test_disabled_audits_nothing() {
        let settings = AuditSettings {
            enabled: false,
            ..AuditSettings::default()
        };
        assert!(!should_audit("shop.widget", &settings));
    }

    #[test]
    fn test_inclusion_list() {
        let settings = settings(Some(&["shop.category"]), &[]);

        assert!(should_audit("shop.category", &settings));
        assert!(should_audit("Shop.Category", &settings));
        assert!(!should_audit("shop.widget", &settings));
    }

    #[test]
    fn test_empty_inclusion_list_means_all() {
        assert!(should_audit("shop.widget", &settings(Some(&[]), &[])));
    }

    #[test]
    fn test_exclusion_without_inclusion() {
        let settings = settings(None, &["shop.widget"]);

        assert!(!should_audit("shop.widget", &settings));
        assert!(should_audit("shop.category", &settings));
    }

    #[test]
    fn test_exclusion_overrides_inclusion() {
        let settings = settings(Some(&["shop.widget", "shop.category"]), &["shop.widget"]);

        assert!(!should_audit("shop.widget", &settings));
        assert!(should_audit("shop.category", &settings));
    }
}
