use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location::LocationScope;

/// Reserved user id recorded on orders placed without an authenticated session.
pub const ANONYMOUS_USER_ID: Uuid = Uuid::nil();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    /// Location the user is assigned to. Only meaningful for staff.
    pub location: LocationScope,
}

/// The caller's identity, passed explicitly to the checkout and terminal components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<SessionUser>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// User id to record on an order, or the anonymous sentinel.
    pub fn order_user_id(&self) -> Uuid {
        self.user
            .as_ref()
            .map(|user| user.user_id)
            .unwrap_or(ANONYMOUS_USER_ID)
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.role.is_staff())
    }

    /// Returns a new session acting as `user`; the previous one is left untouched.
    pub fn switch_identity(&self, user: SessionUser) -> Session {
        Session::authenticated(user)
    }
}

/// Staff identity as seen by the fulfillment terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffSession {
    pub user_id: Uuid,
    pub assigned: LocationScope,
}

impl StaffSession {
    pub fn new(user_id: Uuid, assigned: LocationScope) -> Self {
        Self { user_id, assigned }
    }
}

impl TryFrom<&Session> for StaffSession {
    type Error = &'static str;

    fn try_from(session: &Session) -> Result<Self, Self::Error> {
        match session.user() {
            Some(user) if user.role.is_staff() => Ok(StaffSession::new(user.user_id, user.location)),
            Some(_) => Err("User is not a staff member"),
            None => Err("Not signed in"),
        }
    }
}
