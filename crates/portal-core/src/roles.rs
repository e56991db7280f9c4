//! Role policy: pure capability checks over a user's role set.
//!
//! These checks only decide what the portal shows and enables. The backend
//! enforces authorization on every endpoint regardless.

use std::collections::BTreeSet;

label_enum! {
    pub enum Role {
        ProviderAdmin => "Provider Admin",
        SupplierRepresentative => "Supplier Representative",
        ContractRole => "Contract Role",
        Specialist => "Specialist",
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.label().cmp(other.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: BTreeSet<Role>,
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().collect(),
        }
    }
}

impl RoleSet {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn labels(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.label().to_string()).collect()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }

    /// A specialist with no supplier-side role sees only their own work.
    pub fn is_specialist_only(&self) -> bool {
        self.has_role(&Role::Specialist)
            && !self.has_any_role(&[
                Role::ProviderAdmin,
                Role::SupplierRepresentative,
                Role::ContractRole,
            ])
    }

    pub fn can_view_contracts(&self) -> bool {
        self.has_any_role(&[Role::ProviderAdmin, Role::ContractRole])
    }

    pub fn can_negotiate_contracts(&self) -> bool {
        self.has_any_role(&[Role::ProviderAdmin, Role::ContractRole])
    }

    pub fn can_view_service_requests(&self) -> bool {
        self.has_any_role(&[Role::ProviderAdmin, Role::SupplierRepresentative])
    }

    pub fn can_submit_offers(&self) -> bool {
        self.has_any_role(&[Role::ProviderAdmin, Role::SupplierRepresentative])
    }

    pub fn can_sync_service_requests(&self) -> bool {
        self.can_submit_offers()
    }

    pub fn can_view_service_orders(&self) -> bool {
        self.has_any_role(&[
            Role::ProviderAdmin,
            Role::SupplierRepresentative,
            Role::Specialist,
        ])
    }

    pub fn can_manage_service_orders(&self) -> bool {
        self.has_any_role(&[Role::ProviderAdmin, Role::SupplierRepresentative])
    }

    pub fn can_view_specialists(&self) -> bool {
        self.has_any_role(&[Role::ProviderAdmin, Role::SupplierRepresentative])
    }

    pub fn can_manage_users(&self) -> bool {
        self.has_role(&Role::ProviderAdmin)
    }

    pub fn can_edit_provider(&self) -> bool {
        self.has_role(&Role::ProviderAdmin)
    }

    pub fn can_view_activity_log(&self) -> bool {
        self.has_role(&Role::ProviderAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(roles: &[Role]) -> RoleSet {
        roles.iter().cloned().collect()
    }

    #[test]
    fn role_labels_parse_loosely() {
        assert_eq!(Role::parse("provider_admin"), Role::ProviderAdmin);
        assert_eq!(Role::parse("SUPPLIER REPRESENTATIVE"), Role::SupplierRepresentative);
        assert_eq!(Role::parse("Auditor"), Role::Other("Auditor".into()));
    }

    #[test]
    fn admin_sees_everything() {
        let admin = set(&[Role::ProviderAdmin]);
        assert!(admin.can_view_contracts());
        assert!(admin.can_manage_users());
        assert!(admin.can_view_activity_log());
        assert!(admin.can_submit_offers());
        assert!(!admin.is_specialist_only());
    }

    #[test]
    fn specialist_only_is_limited_to_orders() {
        let specialist = set(&[Role::Specialist]);
        assert!(specialist.is_specialist_only());
        assert!(specialist.can_view_service_orders());
        assert!(!specialist.can_manage_service_orders());
        assert!(!specialist.can_view_contracts());
        assert!(!specialist.can_view_activity_log());
        assert!(!specialist.can_manage_users());
    }

    #[test]
    fn mixed_roles_are_not_specialist_only() {
        let both = set(&[Role::Specialist, Role::SupplierRepresentative]);
        assert!(!both.is_specialist_only());
        assert!(both.can_view_service_requests());
        assert!(!both.can_view_contracts());
    }

    #[test]
    fn contract_role_negotiates_but_does_not_bid() {
        let contract = set(&[Role::ContractRole]);
        assert!(contract.can_negotiate_contracts());
        assert!(!contract.can_submit_offers());
        assert!(!contract.can_edit_provider());
    }

    #[test]
    fn empty_set_has_no_capabilities() {
        let none = RoleSet::default();
        assert!(none.is_empty());
        assert!(!none.has_any_role(&[Role::ProviderAdmin, Role::Specialist]));
        assert!(!none.can_view_service_orders());
    }
}
