//! Authorization decision procedure. Every check re-reads the user and
//! profile catalogs so that an administrative suspend that happened after
//! login is honored at the very next gate.
//!
//! Cascading suspension: a suspended profile denies every user holding that
//! role even though the users' own suspended flags stay false in storage.
//! The cascade is derived here, never written back.

use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::storage::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("user not found")]
    UserNotFound,
    #[error("user suspended")]
    UserSuspended,
    #[error("profile not found")]
    ProfileNotFound,
    #[error("profile suspended")]
    ProfileSuspended,
    #[error("right not granted")]
    RightNotGranted,
    #[error("role mismatch")]
    RoleMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Steps 1-4 shared by both checks: user lookup, user flag, profile lookup
/// by the user's role string, profile flag. Returns the profile's role and
/// current rights on success.
fn resolve_access(store: &Store, username: &str) -> AppResult<Result<(String, Vec<String>), DenyReason>> {
    let user = match store.get_user(username) {
        Ok(user) => user,
        Err(AppError::NotFound { .. }) => return Ok(Err(DenyReason::UserNotFound)),
        Err(e) => return Err(e),
    };
    if user.suspended {
        return Ok(Err(DenyReason::UserSuspended));
    }
    // The role reference is by value and unvalidated at write time; a
    // dangling role surfaces here as a denial.
    let profile = match store.get_profile(&user.role) {
        Ok(profile) => profile,
        Err(AppError::NotFound { .. }) => return Ok(Err(DenyReason::ProfileNotFound)),
        Err(e) => return Err(e),
    };
    if profile.suspended {
        return Ok(Err(DenyReason::ProfileSuspended));
    }
    Ok(Ok((user.role, profile.rights)))
}

/// Fine-grained check: may `username` exercise `right`?
pub fn check_right(store: &Store, username: &str, right: &str) -> AppResult<Decision> {
    match resolve_access(store, username)? {
        Err(reason) => Ok(Decision::Deny(reason)),
        Ok((_role, rights)) => {
            if rights.iter().any(|r| r == right) {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::Deny(DenyReason::RightNotGranted))
            }
        }
    }
}

/// Coarse route-level check: is `username`'s role one of `allowed_roles`?
pub fn check_role(store: &Store, username: &str, allowed_roles: &[&str]) -> AppResult<Decision> {
    match resolve_access(store, username)? {
        Err(reason) => Ok(Decision::Deny(reason)),
        Ok((role, _rights)) => {
            if allowed_roles.contains(&role.as_str()) {
                Ok(Decision::Allow)
            } else {
                Ok(Decision::Deny(DenyReason::RoleMismatch))
            }
        }
    }
}
