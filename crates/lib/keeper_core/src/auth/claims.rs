//! Claims factory: the canonical claim set for a user.

use crate::models::auth::{ADMIN_ROLE, Claims, User};

/// Build the claims embedded in an access token for `user`.
///
/// `sub` is the user id, `name` the username, and `roles` contains
/// `"admin"` exactly when the user's admin flag is set.
pub fn claims_for(user: &User) -> Claims {
    let mut roles = Vec::new();
    if user.is_admin {
        roles.push(ADMIN_ROLE.to_string());
    }
    Claims {
        sub: user.id,
        name: user.username.clone(),
        roles,
    }
}
