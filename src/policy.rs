//! Resource-modification authorization.
//!
//! Every edit/delete handler funnels through [`evaluate`] instead of
//! repeating inline role-string comparisons.

use crate::utils::jwt::Claims;

/// Result of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Role column values are free-form strings; anything unknown is
    /// treated as a plain user.
    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

/// The authenticated caller, as far as authorization is concerned.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> Actor {
        Actor {
            id: claims.sub.parse::<i64>().unwrap_or(0),
            role: Role::parse(&claims.role),
        }
    }
}

/// May `actor` modify a resource owned by `resource_owner_id`?
/// The owner, a moderator, or an admin may; anyone else may not.
pub fn evaluate(actor: &Actor, resource_owner_id: i64) -> Decision {
    if actor.id == resource_owner_id {
        return Decision::Allow;
    }
    match actor.role {
        Role::Moderator | Role::Admin => Decision::Allow,
        Role::User => Decision::Deny,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_may_modify_own_resource() {
        let actor = Actor { id: 5, role: Role::User };
        assert_eq!(evaluate(&actor, 5), Decision::Allow);
    }

    #[test]
    fn plain_user_may_not_modify_others() {
        let actor = Actor { id: 5, role: Role::User };
        assert_eq!(evaluate(&actor, 6), Decision::Deny);
    }

    #[test]
    fn moderator_and_admin_bypass_ownership() {
        let moderator = Actor { id: 5, role: Role::Moderator };
        let admin = Actor { id: 5, role: Role::Admin };
        assert_eq!(evaluate(&moderator, 6), Decision::Allow);
        assert_eq!(evaluate(&admin, 6), Decision::Allow);
    }

    #[test]
    fn unknown_role_string_falls_back_to_user() {
        assert_eq!(Role::parse("superuser"), Role::User);
        assert_eq!(Role::parse("moderator"), Role::Moderator);
        assert_eq!(Role::parse("admin"), Role::Admin);
    }
}
