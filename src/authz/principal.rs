use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The closed set of roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    Admin,
    Manager,
    Member,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Member => "Member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Authenticated caller identity, fixed for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role);
        self
    }

    /// Role names that don't parse are dropped rather than rejected; an
    /// unrecognised claim grants nothing.
    pub fn with_role_names<S: AsRef<str>>(self, names: impl IntoIterator<Item = S>) -> Self {
        let roles = names.into_iter().filter_map(|name| name.as_ref().parse::<Role>().ok());
        self.with_roles(roles)
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user_id.trim().is_empty()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.is_authenticated() && self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("manager".parse::<Role>(), Ok(Role::Manager));
        assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
        assert!("Owner".parse::<Role>().is_err());
    }

    #[test]
    fn unknown_role_claims_grant_nothing() {
        let principal = Principal::new("u1").with_role_names(["Member", "Superuser"]);
        assert_eq!(principal.roles.len(), 1);
        assert!(principal.has_role(Role::Member));
    }

    #[test]
    fn blank_user_id_is_not_authenticated() {
        assert!(!Principal::new("   ").is_authenticated());
        assert!(!Principal::new("").is(""));
        assert!(Principal::new("u1").is("u1"));
    }
}
