//! Client-side route guard. The client keeps the profile blob returned by
//! login in a fixed key-value slot; before navigating to a protected feature
//! area the guard re-reads that slot and matches the stored role against the
//! roles the route admits. Anything unreadable is treated as logged-out:
//! missing blob, broken JSON and a blob with no role all fail closed. A
//! denial never renders; it only redirects to the login entry point.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fixed slot key for the authenticated profile blob.
pub const SESSION_SLOT_KEY: &str = "user";

/// Process-local key-value slot holding the authenticated profile blob
/// verbatim. Populated on login, cleared on logout or detected invalidation.
#[derive(Debug, Default)]
pub struct SessionSlot {
    values: HashMap<String, String>,
}

/// The shape of the blob the client persists after a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub rights: Vec<String>,
    /// Opaque server session token, replayed on API calls.
    pub token: String,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, blob: &str) {
        self.values.insert(SESSION_SLOT_KEY.to_string(), blob.to_string());
    }

    pub fn store_session(&mut self, session: &StoredSession) {
        // Serialization of a plain struct cannot fail
        if let Ok(blob) = serde_json::to_string(session) {
            self.store(&blob);
        }
    }

    pub fn load(&self) -> Option<&str> {
        self.values.get(SESSION_SLOT_KEY).map(|s| s.as_str())
    }

    pub fn clear(&mut self) {
        self.values.remove(SESSION_SLOT_KEY);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Unauthenticated,
    Authenticated { role: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    RedirectToLogin,
}

pub struct RouteGuard;

impl RouteGuard {
    /// Derive the guard state from the stored blob. Parse failures never
    /// surface: corrupt session data must behave exactly like no session
    /// data.
    pub fn state(slot: &SessionSlot) -> GuardState {
        let Some(blob) = slot.load() else {
            return GuardState::Unauthenticated;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(blob) else {
            return GuardState::Unauthenticated;
        };
        match value.get("role").and_then(|r| r.as_str()) {
            Some(role) if !role.trim().is_empty() => GuardState::Authenticated { role: role.to_string() },
            _ => GuardState::Unauthenticated,
        }
    }

    /// Gate navigation to a route admitting `allowed_roles`. An empty slice
    /// means any authenticated role may pass.
    pub fn check(slot: &SessionSlot, allowed_roles: &[&str]) -> GuardOutcome {
        match Self::state(slot) {
            GuardState::Unauthenticated => GuardOutcome::RedirectToLogin,
            GuardState::Authenticated { role } => {
                if allowed_roles.is_empty() || allowed_roles.contains(&role.as_str()) {
                    GuardOutcome::Proceed
                } else {
                    GuardOutcome::RedirectToLogin
                }
            }
        }
    }
}
