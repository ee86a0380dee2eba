//! Profile catalog: role templates binding a role name to a rights bundle.
//!
//! Profiles are soft-state only: they are never physically deleted, and
//! suspension is a flag consulted by the authorizer, never a removal.
//! Suspending a profile does NOT touch the suspended flags of users holding
//! that role; the cascade is derived at authorization time.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::rights;
use super::Store;

const COLLECTION: &str = "profiles";

/// A named role template. `role` is the primary key and immutable after
/// creation; `rights` is always non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub role: String,
    pub rights: Vec<String>,
    #[serde(default)]
    pub suspended: bool,
}

fn validate_rights(rights: &[String]) -> AppResult<()> {
    if rights.is_empty() {
        return Err(AppError::validation("empty_rights", "a profile must grant at least one right"));
    }
    for token in rights {
        if !rights::is_known(token) {
            return Err(AppError::validation(
                "unknown_right".into(),
                format!("'{}' is not a known right", token),
            ));
        }
    }
    Ok(())
}

impl Store {
    /// Create a new profile. Fails if the role already exists, the rights
    /// set is empty, or any token is outside the catalog.
    pub fn create_profile(&self, role: &str, rights: &[String]) -> AppResult<Profile> {
        if role.trim().is_empty() {
            return Err(AppError::validation("empty_role", "role is required"));
        }
        validate_rights(rights)?;
        let mut all: Vec<Profile> = self.read_collection(COLLECTION)?;
        if all.iter().any(|p| p.role == role) {
            return Err(AppError::validation(
                "duplicate_role".into(),
                format!("profile with role '{}' already exists", role),
            ));
        }
        let profile = Profile { role: role.to_string(), rights: rights.to_vec(), suspended: false };
        all.push(profile.clone());
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::profiles", "profile created role='{}' rights={}", role, profile.rights.len());
        Ok(profile)
    }

    pub fn get_profile(&self, role: &str) -> AppResult<Profile> {
        let all: Vec<Profile> = self.read_collection(COLLECTION)?;
        all.into_iter()
            .find(|p| p.role == role)
            .ok_or_else(|| AppError::not_found("profile_not_found".into(), format!("profile '{}' not found", role)))
    }

    /// With a role filter this behaves as `get_profile`; without one it
    /// returns all profiles in insertion order.
    pub fn list_profiles(&self, role: Option<&str>) -> AppResult<Vec<Profile>> {
        match role {
            Some(r) => Ok(vec![self.get_profile(r)?]),
            None => self.read_collection(COLLECTION),
        }
    }

    /// Full replacement of a profile's rights set (not a merge).
    pub fn update_profile_rights(&self, role: &str, new_rights: &[String]) -> AppResult<Profile> {
        validate_rights(new_rights)?;
        let mut all: Vec<Profile> = self.read_collection(COLLECTION)?;
        let Some(p) = all.iter_mut().find(|p| p.role == role) else {
            return Err(AppError::not_found("profile_not_found".into(), format!("profile '{}' not found", role)));
        };
        p.rights = new_rights.to_vec();
        let updated = p.clone();
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::profiles", "profile updated role='{}' rights={}", role, updated.rights.len());
        Ok(updated)
    }

    /// Idempotent: suspending an already-suspended profile is a no-op success.
    pub fn suspend_profile(&self, role: &str) -> AppResult<()> {
        self.set_profile_suspended(role, true)
    }

    /// Idempotent: re-enabling an active profile is a no-op success.
    pub fn reenable_profile(&self, role: &str) -> AppResult<()> {
        self.set_profile_suspended(role, false)
    }

    fn set_profile_suspended(&self, role: &str, suspended: bool) -> AppResult<()> {
        let mut all: Vec<Profile> = self.read_collection(COLLECTION)?;
        let Some(p) = all.iter_mut().find(|p| p.role == role) else {
            return Err(AppError::not_found("profile_not_found".into(), format!("profile '{}' not found", role)));
        };
        if p.suspended == suspended {
            return Ok(());
        }
        p.suspended = suspended;
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::profiles", "profile '{}' suspended={}", role, suspended);
        Ok(())
    }

    /// Case-insensitive substring search over role names and rights tokens.
    pub fn search_profiles(&self, query: &str) -> AppResult<Vec<Profile>> {
        let matcher = super::search_matcher(query)?;
        let all: Vec<Profile> = self.read_collection(COLLECTION)?;
        Ok(all
            .into_iter()
            .filter(|p| matcher.is_match(&p.role) || p.rights.iter().any(|r| matcher.is_match(r)))
            .collect())
    }

    /// Seed the default role bundles on an empty store. Existing profiles
    /// are left untouched.
    pub fn ensure_default_profiles(&self) -> AppResult<()> {
        let existing: Vec<Profile> = self.read_collection(COLLECTION)?;
        if !existing.is_empty() {
            return Ok(());
        }
        for role in rights::DEFAULT_ROLES {
            let bundle: Vec<String> = rights::default_bundle(role)
                .unwrap_or_default()
                .iter()
                .map(|s| s.to_string())
                .collect();
            self.create_profile(role, &bundle)?;
        }
        Ok(())
    }
}
