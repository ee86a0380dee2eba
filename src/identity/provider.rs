use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::storage::SharedStore;

use super::principal::Principal;
use super::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Login against the local user/profile catalogs. A session is issued only
/// if the password verifies AND neither the account nor its profile is
/// suspended; all failure modes collapse into one credential error so the
/// login form cannot be used to probe account state.
pub struct LocalAuthProvider {
    store: SharedStore,
    sessions: std::sync::Arc<SessionManager>,
}

impl LocalAuthProvider {
    pub fn new(store: SharedStore, sessions: std::sync::Arc<SessionManager>) -> Self {
        Self { store, sessions }
    }
}

fn invalid_credentials() -> AppError {
    AppError::auth("invalid_credentials", "invalid credentials or account suspended")
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let guard = self.store.0.lock();
        if !guard.verify_user_password(&req.username, &req.password)? {
            return Err(invalid_credentials());
        }
        let user = guard.get_user(&req.username).map_err(|_| invalid_credentials())?;
        if user.suspended {
            return Err(invalid_credentials());
        }
        let profile = guard.get_profile(&user.role).map_err(|_| invalid_credentials())?;
        if profile.suspended {
            return Err(invalid_credentials());
        }
        drop(guard);

        let principal = Principal {
            username: user.username.clone(),
            role: profile.role.clone(),
            rights: profile.rights.clone(),
        };
        let session = self.sessions.issue(principal)?;
        debug!(target: "motormart::auth", "login user='{}' sid={}", req.username, session.session_id);
        Ok(LoginResponse { session })
    }
}
