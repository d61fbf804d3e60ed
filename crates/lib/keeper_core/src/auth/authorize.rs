//! Ownership-based authorization for todo operations.

use uuid::Uuid;

use crate::models::auth::Claims;

/// Which todos a caller may see in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoScope {
    /// Every todo (admins).
    All,
    /// Only todos owned by this user.
    Owner(Uuid),
}

/// True iff the caller owns the resource or is an admin.
pub fn can_act(claims: &Claims, owner_id: Uuid) -> bool {
    claims.sub == owner_id || claims.is_admin()
}

/// Listing scope for the caller.
pub fn list_scope(claims: &Claims) -> TodoScope {
    if claims.is_admin() {
        TodoScope::All
    } else {
        TodoScope::Owner(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::ADMIN_ROLE;

    fn claims(id: Uuid, admin: bool) -> Claims {
        Claims {
            sub: id,
            name: "u".into(),
            roles: if admin { vec![ADMIN_ROLE.into()] } else { vec![] },
        }
    }

    #[test]
    fn owner_may_act() {
        let owner = Uuid::new_v4();
        assert!(can_act(&claims(owner, false), owner));
    }

    #[test]
    fn admin_may_act_on_anything() {
        assert!(can_act(&claims(Uuid::new_v4(), true), Uuid::new_v4()));
    }

    #[test]
    fn stranger_may_not_act() {
        assert!(!can_act(&claims(Uuid::new_v4(), false), Uuid::new_v4()));
    }

    #[test]
    fn scope_follows_admin_flag() {
        let id = Uuid::new_v4();
        assert_eq!(list_scope(&claims(id, false)), TodoScope::Owner(id));
        assert_eq!(list_scope(&claims(id, true)), TodoScope::All);
    }
}
