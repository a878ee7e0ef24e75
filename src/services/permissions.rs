use std::collections::{HashMap, HashSet};
use crate::error::{AppError, Result};

/// Static role → module → action lookup. Deny-by-default: any (role, module)
/// pair not present in the table answers false.
pub struct PermissionResolver {
    table: HashMap<String, HashMap<String, HashSet<String>>>,
}

/// All actions a module can expose.
const ALL_ACTIONS: [&str; 4] = ["view", "create", "edit", "delete"];

impl PermissionResolver {
    /// Builds an empty resolver (denies everything).
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    /// Builds the hospital's role table.
    pub fn hospital_defaults() -> Self {
        let mut resolver = Self::new();

        for module in [
            "patients",
            "appointments",
            "medications",
            "inventory",
            "reports",
            "users",
            "audit",
        ] {
            resolver.grant("admin", module, &ALL_ACTIONS);
        }

        resolver.grant("doctor", "patients", &["view", "create", "edit"]);
        resolver.grant("doctor", "appointments", &ALL_ACTIONS);
        resolver.grant("doctor", "medications", &["view", "create"]);
        resolver.grant("doctor", "reports", &["view"]);

        resolver.grant("nurse", "patients", &["view", "edit"]);
        resolver.grant("nurse", "appointments", &["view"]);
        resolver.grant("nurse", "medications", &["view"]);

        resolver.grant("receptionist", "patients", &["view", "create"]);
        resolver.grant("receptionist", "appointments", &ALL_ACTIONS);

        resolver.grant("pharmacist", "medications", &ALL_ACTIONS);
        resolver.grant("pharmacist", "inventory", &["view", "edit"]);

        resolver.grant("lab_technician", "patients", &["view"]);
        resolver.grant("lab_technician", "reports", &["view", "create"]);

        resolver
    }

    /// Grants `actions` on `module` to `role`.
    pub fn grant(&mut self, role: &str, module: &str, actions: &[&str]) {
        self.table
            .entry(role.to_string())
            .or_default()
            .entry(module.to_string())
            .or_default()
            .extend(actions.iter().map(|a| a.to_string()));
    }

    /// Pure lookup: does `role` hold `action` on `module`?
    pub fn has_permission(&self, role: &str, module: &str, action: &str) -> bool {
        self.table
            .get(role)
            .and_then(|modules| modules.get(module))
            .is_some_and(|actions| actions.contains(action))
    }

    /// Enforcement form of the lookup for protected operations.
    pub fn ensure_permission(&self, role: &str, module: &str, action: &str) -> Result<()> {
        if self.has_permission(role, module, action) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "role '{}' may not {} {}",
                role, action, module
            )))
        }
    }
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self::hospital_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_everything() {
        let resolver = PermissionResolver::hospital_defaults();
        for module in ["patients", "appointments", "inventory", "audit"] {
            for action in ALL_ACTIONS {
                assert!(resolver.has_permission("admin", module, action));
            }
        }
    }

    #[test]
    fn role_boundaries_hold() {
        let resolver = PermissionResolver::hospital_defaults();
        assert!(resolver.has_permission("nurse", "patients", "edit"));
        assert!(!resolver.has_permission("nurse", "patients", "delete"));
        assert!(!resolver.has_permission("receptionist", "medications", "view"));
        assert!(resolver.has_permission("pharmacist", "inventory", "edit"));
    }

    #[test]
    fn deny_by_default_for_unknown_pairs() {
        let resolver = PermissionResolver::hospital_defaults();
        assert!(!resolver.has_permission("intern", "patients", "view"));
        assert!(!resolver.has_permission("doctor", "payroll", "view"));
        assert!(!resolver.has_permission("", "", ""));
    }

    #[test]
    fn ensure_permission_errors_on_denial() {
        let resolver = PermissionResolver::hospital_defaults();
        assert!(resolver.ensure_permission("doctor", "appointments", "delete").is_ok());
        assert!(resolver.ensure_permission("nurse", "audit", "view").is_err());
    }
}
