//! Caller identity and role model
//!
//! The core never issues or validates tokens; an external auth layer hands it
//! an authenticated wallet address plus a role. Everything here is the closed
//! set of roles and the identity struct the services read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::repo::UserRepository;
use crate::types::Result;

/// Roles recognized by the backend.
///
/// Closed set: report aggregation and certification reads dispatch over this
/// enum, never over raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Project-level staff: global, unscoped visibility.
    Project,
    /// Association staff: visibility scoped to their own association.
    Association,
    /// Certificate buyer: public visibility plus owned certificates.
    Buyer,
    /// Default role for producers with no elevated grants.
    Producer,
}

impl Default for Role {
    fn default() -> Self {
        Role::Producer
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Project => write!(f, "project"),
            Role::Association => write!(f, "association"),
            Role::Buyer => write!(f, "buyer"),
            Role::Producer => write!(f, "producer"),
        }
    }
}

impl Role {
    /// Parse a role from its stored string form, falling back to the
    /// producer default for unknown values.
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "project" => Role::Project,
            "association" => Role::Association,
            "buyer" => Role::Buyer,
            _ => Role::Producer,
        }
    }
}

/// Authenticated caller identity supplied by the external auth layer.
///
/// `address` is a bs58-encoded ed25519 public key; `association` is set only
/// for association-role callers and scopes their reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub address: String,
    pub role: Role,
    pub association: Option<String>,
}

impl Caller {
    pub fn new(address: impl Into<String>, role: Role) -> Self {
        Self {
            address: address.into(),
            role,
            association: None,
        }
    }

    pub fn with_association(address: impl Into<String>, association: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: Role::Association,
            association: Some(association.into()),
        }
    }
}

/// Resolve an authenticated wallet address to a caller identity.
///
/// Wallets without a user record get the producer default; the association
/// field is carried over only for association-role users.
pub async fn resolve_caller(users: &Arc<dyn UserRepository>, wallet: &str) -> Result<Caller> {
    let caller = match users.find_by_wallet(wallet).await? {
        Some(user) => Caller {
            address: wallet.to_string(),
            role: user.role,
            association: user.association.filter(|_| user.role == Role::Association),
        },
        None => Caller::new(wallet, Role::Producer),
    };
    Ok(caller)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Project, Role::Association, Role::Buyer, Role::Producer] {
            assert_eq!(Role::from_str_or_default(&role.to_string()), role);
        }
    }

    #[test]
    fn test_unknown_role_defaults_to_producer() {
        assert_eq!(Role::from_str_or_default("superadmin"), Role::Producer);
        assert_eq!(Role::default(), Role::Producer);
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Buyer).unwrap(), "\"buyer\"");
        let parsed: Role = serde_json::from_str("\"association\"").unwrap();
        assert_eq!(parsed, Role::Association);
    }

    #[tokio::test]
    async fn test_resolve_caller_uses_stored_role() {
        use crate::db::schemas::UserDoc;
        use crate::repo::memory::MemoryUserRepo;

        let repo = Arc::new(MemoryUserRepo::default());
        let mut staff = UserDoc::new("assoc-wallet".into(), Role::Association);
        staff.association = Some("AsoCampo".into());
        repo.seed(staff).await;
        repo.seed(UserDoc::new("buyer-wallet".into(), Role::Buyer)).await;

        let users: Arc<dyn UserRepository> = repo;

        let caller = resolve_caller(&users, "assoc-wallet").await.unwrap();
        assert_eq!(caller.role, Role::Association);
        assert_eq!(caller.association.as_deref(), Some("AsoCampo"));

        let caller = resolve_caller(&users, "buyer-wallet").await.unwrap();
        assert_eq!(caller.role, Role::Buyer);
        assert_eq!(caller.association, None);

        // Unknown wallets fall back to the producer default
        let caller = resolve_caller(&users, "stranger").await.unwrap();
        assert_eq!(caller.role, Role::Producer);
    }
}
