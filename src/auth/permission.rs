//! Permission checking for labbook.
//!
//! Role-based access control for bookings and user management.

use thiserror::Error;

use super::token::Claims;
use crate::db::Role;

/// Permission-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Only administrators may do this.
    #[error("administrator role required")]
    AdminRequired,

    /// Only the owner or an administrator may do this.
    #[error("only the owner or an administrator may modify this booking")]
    NotOwner,
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: i64,
    pub role: Role,
}

impl Requester {
    /// Create a requester.
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Whether the requester is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&Claims> for Requester {
    fn from(claims: &Claims) -> Self {
        Self::new(claims.sub, claims.role)
    }
}

/// Require the administrator role.
///
/// # Examples
///
/// ```
/// use labbook::auth::permission::{require_admin, PermissionError, Requester};
/// use labbook::db::Role;
///
/// assert!(require_admin(&Requester::new(1, Role::Admin)).is_ok());
/// assert_eq!(
///     require_admin(&Requester::new(2, Role::Lecturer)),
///     Err(PermissionError::AdminRequired)
/// );
/// ```
pub fn require_admin(requester: &Requester) -> Result<(), PermissionError> {
    if requester.is_admin() {
        Ok(())
    } else {
        Err(PermissionError::AdminRequired)
    }
}

/// Check that the requester may modify a booking owned by `owner_id`.
///
/// Owners may always modify their bookings; administrators may modify any.
pub fn can_modify_booking(requester: &Requester, owner_id: i64) -> Result<(), PermissionError> {
    if requester.user_id == owner_id || requester.is_admin() {
        Ok(())
    } else {
        Err(PermissionError::NotOwner)
    }
}
