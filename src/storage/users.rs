//! User account catalog. A user is bound to a profile by role *name*, not by
//! reference: the role may name a profile that does not exist yet or one
//! that is suspended. Both cases surface at authorization time, never at
//! write time. Accounts are never physically deleted.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use super::Store;

const COLLECTION: &str = "users";

/// A user account. `username` is the primary key and immutable; `email` and
/// `role` are mutable through `update_user`. Passwords are stored as Argon2
/// PHC strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub suspended: bool,
}

/// Mutable fields accepted by `update_user`. Absent fields are left as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub role: Option<String>,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::internal("salt".into(), e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::internal("salt_b64".into(), e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash".into(), e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

impl Store {
    /// Create a new account. All four fields are required and the username
    /// must be free. The role is deliberately NOT checked against the
    /// profile catalog.
    pub fn create_user(&self, username: &str, password: &str, email: &str, role: &str) -> AppResult<User> {
        for (field, value) in [("username", username), ("password", password), ("email", email), ("role", role)] {
            if value.trim().is_empty() {
                return Err(AppError::validation("missing_field".into(), format!("{} is required", field)));
            }
        }
        let mut all: Vec<User> = self.read_collection(COLLECTION)?;
        if all.iter().any(|u| u.username == username) {
            return Err(AppError::validation(
                "duplicate_username".into(),
                format!("user '{}' already exists", username),
            ));
        }
        let user = User {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            email: email.to_string(),
            role: role.to_string(),
            suspended: false,
        };
        all.push(user.clone());
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::users", "user created username='{}' role='{}'", username, role);
        Ok(user)
    }

    pub fn get_user(&self, username: &str) -> AppResult<User> {
        let all: Vec<User> = self.read_collection(COLLECTION)?;
        all.into_iter()
            .find(|u| u.username == username)
            .ok_or_else(|| AppError::not_found("user_not_found".into(), format!("user '{}' not found", username)))
    }

    /// With a username filter this behaves as `get_user`; without one it
    /// returns all accounts in insertion order.
    pub fn list_users(&self, username: Option<&str>) -> AppResult<Vec<User>> {
        match username {
            Some(u) => Ok(vec![self.get_user(u)?]),
            None => self.read_collection(COLLECTION),
        }
    }

    /// Partial update of the mutable fields (email, role).
    pub fn update_user(&self, username: &str, update: &UserUpdate) -> AppResult<User> {
        let mut all: Vec<User> = self.read_collection(COLLECTION)?;
        let Some(u) = all.iter_mut().find(|u| u.username == username) else {
            return Err(AppError::not_found("user_not_found".into(), format!("user '{}' not found", username)));
        };
        if let Some(email) = &update.email {
            if email.trim().is_empty() {
                return Err(AppError::validation("missing_field", "email may not be blank"));
            }
            u.email = email.clone();
        }
        if let Some(role) = &update.role {
            if role.trim().is_empty() {
                return Err(AppError::validation("missing_field", "role may not be blank"));
            }
            u.role = role.clone();
        }
        let updated = u.clone();
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::users", "user updated username='{}'", username);
        Ok(updated)
    }

    /// Idempotent: suspending an already-suspended account is a no-op success.
    pub fn suspend_user(&self, username: &str) -> AppResult<()> {
        self.set_user_suspended(username, true)
    }

    /// Idempotent: re-enabling an active account is a no-op success.
    pub fn reenable_user(&self, username: &str) -> AppResult<()> {
        self.set_user_suspended(username, false)
    }

    fn set_user_suspended(&self, username: &str, suspended: bool) -> AppResult<()> {
        let mut all: Vec<User> = self.read_collection(COLLECTION)?;
        let Some(u) = all.iter_mut().find(|u| u.username == username) else {
            return Err(AppError::not_found("user_not_found".into(), format!("user '{}' not found", username)));
        };
        if u.suspended == suspended {
            return Ok(());
        }
        u.suspended = suspended;
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::users", "user '{}' suspended={}", username, suspended);
        Ok(())
    }

    /// Case-insensitive substring search over username and email.
    pub fn search_users(&self, query: &str) -> AppResult<Vec<User>> {
        let matcher = super::search_matcher(query)?;
        let all: Vec<User> = self.read_collection(COLLECTION)?;
        Ok(all
            .into_iter()
            .filter(|u| matcher.is_match(&u.username) || matcher.is_match(&u.email))
            .collect())
    }

    /// Verify a login attempt against the stored PHC hash. Unknown users
    /// and bad passwords are indistinguishable to the caller.
    pub fn verify_user_password(&self, username: &str, password: &str) -> AppResult<bool> {
        let all: Vec<User> = self.read_collection(COLLECTION)?;
        Ok(all
            .iter()
            .find(|u| u.username == username)
            .map(|u| verify_password(&u.password_hash, password))
            .unwrap_or(false))
    }
}
