//! Central identity management: principals, server-side sessions, the login
//! provider, the authorization decision procedure and the client-side route
//! guard. Keep the public surface thin and split implementation across
//! sub-modules.

mod principal;
mod session;
mod provider;
mod authorizer;
mod guard;

pub use principal::Principal;
pub use session::{Session, SessionToken, SessionManager};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
pub use authorizer::{Decision, DenyReason, check_right, check_role};
pub use guard::{GuardOutcome, GuardState, RouteGuard, SessionSlot, StoredSession, SESSION_SLOT_KEY};
