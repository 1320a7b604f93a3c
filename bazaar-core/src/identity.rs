use bazaar_shared::models::UserId;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    SubAdmin,
    Admin,
}

/// An already-authenticated caller. Token verification happens upstream;
/// the core only looks at who is asking and in which role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn sub_admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::SubAdmin,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Back-office roles: both ADMIN and SUB_ADMIN run the order console.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SubAdmin)
    }

    /// Owner-scoped customer actions (returns, self-cancel) may also be
    /// performed by a full ADMIN, but not by a SUB_ADMIN.
    pub fn acts_for(&self, owner: UserId) -> bool {
        self.user_id == owner || self.is_admin()
    }

    pub fn require_staff(&self, action: &str) -> CoreResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(CoreError::Unauthorized(format!(
                "user {} may not {}",
                self.user_id, action
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gates() {
        assert!(Principal::admin(1).acts_for(99));
        assert!(!Principal::sub_admin(1).acts_for(99));
        assert!(Principal::user(99).acts_for(99));
        assert!(Principal::sub_admin(1).require_staff("update orders").is_ok());
        assert!(Principal::user(1).require_staff("update orders").is_err());
    }
}
