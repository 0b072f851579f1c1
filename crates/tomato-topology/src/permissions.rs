use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A login identifier, opaque to this crate. Organization membership for
/// `topology_list` filtering is resolved through [`crate::service::PermissionsView`],
/// not stored here — a topology only remembers the per-user role it granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }
}

/// A topology-scoped role, ranked `User < Manager < Owner`. Higher roles
/// imply every permission of the roles below them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    User,
    Manager,
    Owner,
}

/// The identity behind a request: the user's login plus whether they hold
/// the process-wide admin identity, which `checkRole` treats as passing
/// any role check and which the reaper always acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: UserId,
    pub is_global_admin: bool,
}

impl Caller {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            is_global_admin: false,
        }
    }

    pub fn global_admin(user: UserId) -> Self {
        Self {
            user,
            is_global_admin: true,
        }
    }
}

/// The per-user role grants on one topology. The creator is always granted
/// `Owner` at creation time; every other entry comes from an explicit
/// `permission` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    grants: HashMap<UserId, Role>,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(user: UserId) -> Self {
        let mut perms = Self::new();
        perms.grants.insert(user, Role::Owner);
        perms
    }

    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        self.grants.get(user).copied()
    }

    /// True if `user` holds at least `required`.
    pub fn has_role(&self, user: &UserId, required: Role) -> bool {
        self.role_of(user).is_some_and(|role| role >= required)
    }

    /// `checkRole`: true if `caller` holds at least `required`, or is the
    /// process-wide admin identity (which passes every role check).
    pub fn check_role(&self, caller: &Caller, required: Role) -> bool {
        caller.is_global_admin || self.has_role(&caller.user, required)
    }

    pub fn set_role(&mut self, user: UserId, role: Role) {
        self.grants.insert(user, role);
    }

    pub fn revoke(&mut self, user: &UserId) {
        self.grants.remove(user);
    }

    pub fn grants(&self) -> impl Iterator<Item = (&UserId, &Role)> {
        self.grants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_ranks_above_manager_and_user() {
        assert!(Role::Owner > Role::Manager);
        assert!(Role::Manager > Role::User);
    }

    #[test]
    fn has_role_checks_minimum_rank() {
        let mut perms = Permissions::new();
        perms.set_role(UserId::new("alice"), Role::Manager);
        assert!(perms.has_role(&UserId::new("alice"), Role::User));
        assert!(perms.has_role(&UserId::new("alice"), Role::Manager));
        assert!(!perms.has_role(&UserId::new("alice"), Role::Owner));
    }

    #[test]
    fn unknown_user_has_no_role() {
        let perms = Permissions::new();
        assert!(!perms.has_role(&UserId::new("bob"), Role::User));
    }

    #[test]
    fn global_admin_passes_every_role_check_without_a_grant() {
        let perms = Permissions::new();
        let admin = Caller::global_admin(UserId::new("root"));
        assert!(perms.check_role(&admin, Role::Owner));
    }

    #[test]
    fn ordinary_caller_without_grant_fails_check_role() {
        let perms = Permissions::new();
        let caller = Caller::new(UserId::new("mallory"));
        assert!(!perms.check_role(&caller, Role::User));
    }
}
