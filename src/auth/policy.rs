/*!
 * # Access Policy Gate
 *
 * Flat role to capability mapping. Every company-scoped handler names the
 * operation it performs and asks [`authorize`] before touching any service.
 */

use crate::entities::membership::Role;
use crate::errors::ServiceError;
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Operations guarded by the policy gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadWarranties,
    ReadServices,
    ReadSales,
    ListMembers,
    InviteMember,
    ChangeMemberRole,
    RemoveMember,
    CreateSale,
    DeactivateWarranty,
    OpenService,
    AdvanceService,
}

impl Operation {
    /// Permission string used in logs and denial messages
    pub fn permission(&self) -> &'static str {
        match self {
            Operation::ReadWarranties => "warranties:read",
            Operation::ReadServices => "services:read",
            Operation::ReadSales => "sales:read",
            Operation::ListMembers => "members:read",
            Operation::InviteMember => "members:invite",
            Operation::ChangeMemberRole => "members:change_role",
            Operation::RemoveMember => "members:remove",
            Operation::CreateSale => "sales:create",
            Operation::DeactivateWarranty => "warranties:deactivate",
            Operation::OpenService => "services:open",
            Operation::AdvanceService => "services:advance",
        }
    }
}

lazy_static! {
    static ref ROLE_CAPABILITIES: HashMap<Role, HashSet<Operation>> = {
        use Operation::*;

        let read = [ReadWarranties, ReadServices, ReadSales, ListMembers];

        let mut roles = HashMap::new();

        // Owner: everything
        roles.insert(
            Role::Owner,
            read.iter()
                .copied()
                .chain([
                    InviteMember,
                    ChangeMemberRole,
                    RemoveMember,
                    CreateSale,
                    DeactivateWarranty,
                    OpenService,
                    AdvanceService,
                ])
                .collect(),
        );

        // Admin: everything except role changes
        roles.insert(
            Role::Admin,
            read.iter()
                .copied()
                .chain([
                    InviteMember,
                    RemoveMember,
                    CreateSale,
                    DeactivateWarranty,
                    OpenService,
                    AdvanceService,
                ])
                .collect(),
        );

        roles.insert(
            Role::Seller,
            read.iter()
                .copied()
                .chain([CreateSale, OpenService, AdvanceService])
                .collect(),
        );

        // Inventory staff move repairs along but never open them
        roles.insert(
            Role::Inventory,
            read.iter().copied().chain([AdvanceService]).collect(),
        );

        roles
    };
}

/// Whether `role` carries `operation`.
pub fn is_allowed(role: Role, operation: Operation) -> bool {
    ROLE_CAPABILITIES
        .get(&role)
        .map_or(false, |caps| caps.contains(&operation))
}

/// Fails with `Forbidden` when the role lacks the operation.
pub fn authorize(role: Role, operation: Operation) -> Result<(), ServiceError> {
    if is_allowed(role, operation) {
        Ok(())
    } else {
        crate::metrics::POLICY_DENIALS.inc();
        warn!(
            role = %role,
            permission = operation.permission(),
            "policy gate denied operation"
        );
        Err(ServiceError::Forbidden(format!(
            "role '{}' cannot perform '{}'",
            role,
            operation.permission()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn every_role_can_read() {
        for role in Role::iter() {
            for op in [
                Operation::ReadWarranties,
                Operation::ReadServices,
                Operation::ReadSales,
                Operation::ListMembers,
            ] {
                assert!(authorize(role, op).is_ok(), "{role} should have {op:?}");
            }
        }
    }

    #[test]
    fn only_owner_changes_roles() {
        assert!(authorize(Role::Owner, Operation::ChangeMemberRole).is_ok());
        for role in [Role::Admin, Role::Seller, Role::Inventory] {
            assert!(matches!(
                authorize(role, Operation::ChangeMemberRole),
                Err(ServiceError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn inventory_can_advance_but_not_open() {
        assert!(authorize(Role::Inventory, Operation::AdvanceService).is_ok());
        assert!(authorize(Role::Inventory, Operation::OpenService).is_err());
        assert!(authorize(Role::Inventory, Operation::CreateSale).is_err());
    }

    #[test]
    fn seller_cannot_deactivate_or_manage_members() {
        assert!(authorize(Role::Seller, Operation::CreateSale).is_ok());
        assert!(authorize(Role::Seller, Operation::OpenService).is_ok());
        assert!(authorize(Role::Seller, Operation::DeactivateWarranty).is_err());
        assert!(authorize(Role::Seller, Operation::InviteMember).is_err());
        assert!(authorize(Role::Seller, Operation::RemoveMember).is_err());
    }

    #[test]
    fn admin_manages_members_except_roles() {
        assert!(authorize(Role::Admin, Operation::InviteMember).is_ok());
        assert!(authorize(Role::Admin, Operation::RemoveMember).is_ok());
        assert!(authorize(Role::Admin, Operation::DeactivateWarranty).is_ok());
    }
}
