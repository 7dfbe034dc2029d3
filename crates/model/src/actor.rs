//! The acting principal for an operation.
//!
//! The source system read roles out of a request-scoped JWT parser; here the
//! actor is an explicit value passed into every domain operation, so
//! authorization is testable without any HTTP machinery. Token parsing stays
//! upstream; this crate only sees the resulting `(id, roles)` pair.

use serde::{Deserialize, Serialize};

use crate::ids::CustomerId;

/// A role granted to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// Canonical role name as issued by the gateway.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ROLE_ADMIN",
            Role::Customer => "ROLE_CUSTOMER",
        }
    }

    /// Parses a gateway role name; unknown roles are ignored by callers.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "ROLE_ADMIN" => Some(Role::Admin),
            "ROLE_CUSTOMER" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// Who is performing an operation, and with which roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// The customer the caller is acting as, if any.
    pub customer_id: Option<CustomerId>,
    /// Granted roles.
    pub roles: Vec<Role>,
}

impl ActorContext {
    /// A customer acting on their own data.
    pub fn customer(id: CustomerId) -> Self {
        Self {
            customer_id: Some(id),
            roles: vec![Role::Customer],
        }
    }

    /// An administrator.
    pub fn admin() -> Self {
        Self {
            customer_id: None,
            roles: vec![Role::Admin],
        }
    }

    /// The background system actor (expiry sweep and similar tasks).
    ///
    /// Carries no roles; background jobs call the services' internal
    /// entry points and only use this value for audit labelling.
    pub fn system() -> Self {
        Self {
            customer_id: None,
            roles: Vec::new(),
        }
    }

    /// A caller with no identity and no roles.
    pub fn anonymous() -> Self {
        Self {
            customer_id: None,
            roles: Vec::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn is_customer(&self) -> bool {
        self.roles.contains(&Role::Customer)
    }

    /// Returns true if the caller may touch data owned by `owner`.
    ///
    /// Admins may touch anything; customers only their own records.
    pub fn can_access(&self, owner: CustomerId) -> bool {
        self.is_admin() || (self.is_customer() && self.customer_id == Some(owner))
    }

    /// Label recorded in the audit trail for this actor.
    pub fn audit_label(&self) -> String {
        match self.customer_id {
            Some(id) if self.is_customer() => format!("customer:{id}"),
            _ if self.is_admin() => "admin".to_string(),
            _ => "system".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_can_access_own_data_only() {
        let owner = CustomerId::new();
        let actor = ActorContext::customer(owner);
        assert!(actor.can_access(owner));
        assert!(!actor.can_access(CustomerId::new()));
    }

    #[test]
    fn admin_can_access_everything() {
        let actor = ActorContext::admin();
        assert!(actor.is_admin());
        assert!(actor.can_access(CustomerId::new()));
    }

    #[test]
    fn anonymous_has_no_access() {
        let actor = ActorContext::anonymous();
        assert!(!actor.is_admin());
        assert!(!actor.is_customer());
        assert!(!actor.can_access(CustomerId::new()));
    }

    #[test]
    fn audit_labels() {
        let id = CustomerId::new();
        assert_eq!(
            ActorContext::customer(id).audit_label(),
            format!("customer:{id}")
        );
        assert_eq!(ActorContext::admin().audit_label(), "admin");
        assert_eq!(ActorContext::anonymous().audit_label(), "system");
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("ROLE_ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("ROLE_CUSTOMER"), Some(Role::Customer));
        assert_eq!(Role::parse("ROLE_UNKNOWN"), None);
        assert_eq!(Role::Admin.as_str(), "ROLE_ADMIN");
    }
}
