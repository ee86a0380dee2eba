use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use super::principal::Principal;
use crate::error::{AppError, AppResult};

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_id() -> AppResult<String> {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("token_rng".into(), e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Owns all live sessions for one server instance. All state is held on the
/// instance and threaded through the app state; nothing here is ambient.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
    user_index: RwLock<HashMap<String, HashSet<String>>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            sessions: RwLock::new(HashMap::new()),
            user_index: RwLock::new(HashMap::new()),
        }
    }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, ..Self::default() }
    }

    pub fn issue(&self, principal: Principal) -> AppResult<Session> {
        let now = Instant::now();
        let sid = gen_id()?;
        let token = gen_id()?;
        let sess = Session {
            session_id: sid.clone(),
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token.clone(), sess.clone());
        self.user_index
            .write()
            .entry(principal.username.clone())
            .or_default()
            .insert(token);
        debug!(target: "motormart::session", "session issued user='{}' sid={} ttl_secs={}", principal.username, sid, self.ttl.as_secs());
        Ok(sess)
    }

    /// Resolve a token to its principal, dropping the session if expired.
    pub fn validate(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let mut expired: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(sess) if sess.expires_at > now => Some(sess.principal.clone()),
                Some(sess) => {
                    expired = Some(sess.principal.username.clone());
                    None
                }
                None => None,
            }
        };
        if let Some(username) = expired {
            self.sessions.write().remove(token);
            self.unindex(&username, token);
        }
        out
    }

    pub fn logout(&self, token: &str) -> bool {
        match self.sessions.write().remove(token) {
            Some(sess) => {
                self.unindex(&sess.principal.username, token);
                true
            }
            None => false,
        }
    }

    /// Drop one token from the user index, removing the entry once empty so
    /// the index cannot grow without bound as sessions expire.
    fn unindex(&self, username: &str, token: &str) {
        let mut idx = self.user_index.write();
        if let Some(set) = idx.get_mut(username) {
            set.remove(token);
            if set.is_empty() {
                idx.remove(username);
            }
        }
    }

    /// Number of tokens currently indexed for a user.
    pub fn user_session_count(&self, username: &str) -> usize {
        self.user_index.read().get(username).map(|s| s.len()).unwrap_or(0)
    }

    /// Drop every live session for a user. Called when an admin suspends an
    /// account so the suspension takes effect before the next guard check.
    pub fn revoke_user(&self, username: &str) -> usize {
        let tokens = self.user_index.write().remove(username).unwrap_or_default();
        let mut count = 0usize;
        let mut map = self.sessions.write();
        for t in &tokens {
            if map.remove(t).is_some() {
                count += 1;
            }
        }
        debug!(target: "motormart::session", "sessions revoked user='{}' count={}", username, count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(name: &str) -> Principal {
        Principal { username: name.into(), role: "buyer".into(), rights: vec!["view_listings".into()] }
    }

    #[test]
    fn issue_validate_logout() {
        let sm = SessionManager::default();
        let sess = sm.issue(principal("alice")).unwrap();
        assert_eq!(sm.validate(&sess.token).unwrap().username, "alice");
        assert!(sm.logout(&sess.token));
        assert!(sm.validate(&sess.token).is_none());
        assert!(!sm.logout(&sess.token));
    }

    #[test]
    fn expired_session_is_pruned() {
        let sm = SessionManager::with_ttl(Duration::from_secs(0));
        let sess = sm.issue(principal("bob")).unwrap();
        assert!(sm.validate(&sess.token).is_none());
    }

    #[test]
    fn pruning_and_logout_clear_the_user_index() {
        let sm = SessionManager::with_ttl(Duration::from_secs(0));
        let sess = sm.issue(principal("erin")).unwrap();
        assert_eq!(sm.user_session_count("erin"), 1);
        assert!(sm.validate(&sess.token).is_none());
        assert_eq!(sm.user_session_count("erin"), 0);

        let sm = SessionManager::default();
        let sess = sm.issue(principal("frank")).unwrap();
        assert!(sm.logout(&sess.token));
        assert_eq!(sm.user_session_count("frank"), 0);
    }

    #[test]
    fn revoke_user_drops_all_tokens() {
        let sm = SessionManager::default();
        let s1 = sm.issue(principal("carol")).unwrap();
        let s2 = sm.issue(principal("carol")).unwrap();
        let other = sm.issue(principal("dave")).unwrap();
        assert_eq!(sm.revoke_user("carol"), 2);
        assert!(sm.validate(&s1.token).is_none());
        assert!(sm.validate(&s2.token).is_none());
        assert!(sm.validate(&other.token).is_some());
    }
}
