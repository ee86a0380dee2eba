//!
//! motormart HTTP server
//! ---------------------
//! Axum-based JSON API for the marketplace: login/logout, user and profile
//! administration, listings and the loan calculator.
//!
//! Responsibilities:
//! - Session management via an opaque random token in a cookie.
//! - Login/logout endpoints backed by the `identity` provider.
//! - Per-request authorization: every protected handler resolves the session
//!   and re-runs the decision procedure against the current catalogs, so an
//!   admin suspend takes effect at the very next request.
//! - First-run seeding of the default role profiles and an admin account.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{extract::{Path, Query, State}, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::{
    check_right, AuthProvider, Decision, DenyReason, LocalAuthProvider, LoginRequest, Principal,
    SessionManager,
};
use crate::loan::LoanTerms;
use crate::storage::{listings::ListingUpdate, users::UserUpdate, SharedStore};

const SESSION_COOKIE: &str = "motormart_session";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sessions: Arc<SessionManager>,
}

/// Start the motormart HTTP server bound to the given port over the given
/// data root. Seeds the default role profiles and an `admin` account on
/// first run, then mounts all routes.
pub async fn run_with_port(http_port: u16, db_root: &str) -> anyhow::Result<()> {
    let store = SharedStore::new(db_root)?;
    ensure_seed_data(&store)?;

    let app_state = AppState { store, sessions: Arc::new(SessionManager::default()) };
    let app = router(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using the default port (8080) and data root.
pub async fn run() -> anyhow::Result<()> {
    let port = std::env::var("MOTORMART_HTTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let root = std::env::var("MOTORMART_DB_FOLDER").unwrap_or_else(|_| "data".to_string());
    run_with_port(port, &root).await
}

/// Seed the default role bundles and a bootstrap admin on an empty store.
pub fn ensure_seed_data(store: &SharedStore) -> anyhow::Result<()> {
    let guard = store.0.lock();
    guard.ensure_default_profiles()?;
    if guard.list_users(None)?.is_empty() {
        guard.create_user("admin", "motormart", "admin@motormart.local", "user_admin")?;
        info!("Seeded bootstrap admin account 'admin' (change its password)");
    }
    Ok(())
}

/// Build the full route map over the given state. Exposed separately so
/// tests can serve the router on an ephemeral port.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "motormart ok" }))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        // user administration
        .route("/api/user_admin/create_user", post(create_user))
        .route("/api/user_admin/view_users", get(view_users))
        .route("/api/user_admin/search_users", get(search_users))
        .route("/api/user_admin/update_user/{username}", put(update_user))
        .route("/api/user_admin/suspend_user/{username}", patch(suspend_user))
        .route("/api/user_admin/reenable_user/{username}", patch(reenable_user))
        .route("/api/user_admin/create_profile", post(create_profile))
        .route("/api/user_admin/view_profiles", get(view_profiles))
        .route("/api/user_admin/search_profiles", get(search_profiles))
        .route("/api/user_admin/update_profile/{role}", put(update_profile))
        .route("/api/user_admin/suspend_profile/{role}", patch(suspend_profile))
        .route("/api/user_admin/reenable_profile/{role}", patch(reenable_profile))
        // listings
        .route("/api/agent/create_listing", post(create_listing))
        .route("/api/agent/update_listing/{id}", put(update_listing))
        .route("/api/agent/delete_listing/{id}", delete(delete_listing))
        .route("/api/buyer/view_listings", get(view_listings))
        .route("/api/buyer/view_listing/{id}", get(view_listing))
        .route("/api/buyer/search_cars", get(search_cars))
        .route("/api/buyer/shortlist/{id}", post(shortlist_listing))
        .route("/api/buyer/view_shortlist", get(view_shortlist))
        .route("/api/buyer/search_shortlist", get(search_shortlist))
        .route("/api/buyer/loan_calculator", post(loan_calculator))
        .route("/api/seller/metrics", get(seller_metrics))
        .with_state(state)
}

// ---------- session plumbing ----------

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

/// Session token: cookie first, `x-session-token` header as a fallback for
/// non-browser clients.
fn session_token(headers: &HeaderMap) -> Option<String> {
    parse_cookie(headers, SESSION_COOKIE)
        .or_else(|| headers.get("x-session-token").and_then(|v| v.to_str().ok()).map(|s| s.to_string()))
}

fn set_session_cookie(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, token))
        .unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("motormart_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/")
}

type ErrResponse = (StatusCode, Json<serde_json::Value>);

fn err_response(err: &AppError) -> ErrResponse {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"status":"error","code": err.code_str(), "message": err.message()})))
}

fn unauthorized() -> ErrResponse {
    (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"})))
}

/// Resolve the caller and authorize `right` against the current catalogs.
/// A session whose account or profile has since been suspended or removed is
/// destroyed on the spot (fail-closed), not merely denied.
fn require_right(state: &AppState, headers: &HeaderMap, right: &str) -> Result<Principal, ErrResponse> {
    let Some(token) = session_token(headers) else { return Err(unauthorized()); };
    let Some(principal) = state.sessions.validate(&token) else { return Err(unauthorized()); };

    let decision = {
        let guard = state.store.0.lock();
        check_right(&guard, &principal.username, right)
    };
    match decision {
        Ok(Decision::Allow) => Ok(principal),
        Ok(Decision::Deny(reason)) => match reason {
            DenyReason::RightNotGranted | DenyReason::RoleMismatch => Err((
                StatusCode::FORBIDDEN,
                Json(json!({"status":"forbidden","reason": reason.to_string()})),
            )),
            // The underlying account or profile is gone or suspended:
            // the session is no longer trustworthy.
            _ => {
                state.sessions.logout(&token);
                Err(unauthorized())
            }
        },
        Err(e) => {
            error!("authorization error: {e}");
            Err(err_response(&e))
        }
    }
}

// ---------- auth handlers ----------

#[derive(Debug, Deserialize)]
struct LoginPayload { username: String, password: String }

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let provider = LocalAuthProvider::new(state.store.clone(), state.sessions.clone());
    let req = LoginRequest { username: payload.username, password: payload.password };
    match provider.login(&req) {
        Ok(resp) => {
            let principal = &resp.session.principal;
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&resp.session.token));
            (
                StatusCode::OK,
                headers,
                Json(json!({
                    "status": "ok",
                    "message": "Login successful",
                    "token": resp.session.token,
                    "profile": {
                        "username": principal.username,
                        "role": principal.role,
                        "rights": principal.rights,
                    }
                })),
            )
        }
        Err(e @ AppError::Auth { .. }) => {
            let (status, body) = err_response(&e);
            (status, HeaderMap::new(), body)
        }
        Err(e) => {
            error!("login error: {e}");
            let (status, body) = err_response(&e);
            (status, HeaderMap::new(), body)
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.sessions.logout(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok","message":"Logout successful"})))
}

// ---------- user administration ----------

#[derive(Debug, Deserialize)]
struct CreateUserPayload { username: String, password: String, email: String, role: String }

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "create_user")?;
    let guard = state.store.0.lock();
    let user = guard
        .create_user(&payload.username, &payload.password, &payload.email, &payload.role)
        .map_err(|e| err_response(&e))?;
    Ok((StatusCode::CREATED, Json(json!({"status":"ok","user": public_user(&user)}))))
}

#[derive(Debug, Deserialize)]
struct NameFilter { username: Option<String> }

async fn view_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<NameFilter>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "view_user")?;
    let guard = state.store.0.lock();
    let users = guard.list_users(filter.username.as_deref()).map_err(|e| err_response(&e))?;
    let users: Vec<_> = users.iter().map(public_user).collect();
    Ok((StatusCode::OK, Json(json!({"status":"ok","users": users}))))
}

#[derive(Debug, Deserialize)]
struct SearchQuery { query: String }

async fn search_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "search_user")?;
    let guard = state.store.0.lock();
    let users = guard.search_users(&q.query).map_err(|e| err_response(&e))?;
    let users: Vec<_> = users.iter().map(public_user).collect();
    Ok((StatusCode::OK, Json(json!({"status":"ok","users": users}))))
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "update_user")?;
    let guard = state.store.0.lock();
    let user = guard.update_user(&username, &update).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","user": public_user(&user)}))))
}

async fn suspend_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "suspend_user")?;
    {
        let guard = state.store.0.lock();
        guard.suspend_user(&username).map_err(|e| err_response(&e))?;
    }
    // Kill live sessions so the suspension is immediate, not just at the
    // next guard check.
    state.sessions.revoke_user(&username);
    Ok((StatusCode::OK, Json(json!({"status":"ok","message":"User suspended successfully"}))))
}

async fn reenable_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "suspend_user")?;
    let guard = state.store.0.lock();
    guard.reenable_user(&username).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","message":"User re-enabled successfully"}))))
}

#[derive(Debug, Deserialize)]
struct CreateProfilePayload { role: String, rights: Vec<String> }

async fn create_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProfilePayload>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "manage_profiles")?;
    let guard = state.store.0.lock();
    let profile = guard.create_profile(&payload.role, &payload.rights).map_err(|e| err_response(&e))?;
    Ok((StatusCode::CREATED, Json(json!({"status":"ok","profile": profile}))))
}

#[derive(Debug, Deserialize)]
struct RoleFilter { role: Option<String> }

async fn view_profiles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<RoleFilter>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "manage_profiles")?;
    let guard = state.store.0.lock();
    let profiles = guard.list_profiles(filter.role.as_deref()).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","profiles": profiles}))))
}

async fn search_profiles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "manage_profiles")?;
    let guard = state.store.0.lock();
    let profiles = guard.search_profiles(&q.query).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","profiles": profiles}))))
}

#[derive(Debug, Deserialize)]
struct UpdateProfilePayload { rights: Vec<String> }

async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role): Path<String>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "manage_profiles")?;
    let guard = state.store.0.lock();
    let profile = guard.update_profile_rights(&role, &payload.rights).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","profile": profile}))))
}

async fn suspend_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role): Path<String>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "manage_profiles")?;
    {
        let guard = state.store.0.lock();
        guard.suspend_profile(&role).map_err(|e| err_response(&e))?;
    }
    // Users of this role keep their own suspended=false; the authorizer
    // derives the denial from the profile flag on every check. Revoking
    // their live sessions here only shortens the window.
    let usernames: Vec<String> = {
        let guard = state.store.0.lock();
        guard
            .list_users(None)
            .map_err(|e| err_response(&e))?
            .into_iter()
            .filter(|u| u.role == role)
            .map(|u| u.username)
            .collect()
    };
    for username in usernames {
        state.sessions.revoke_user(&username);
    }
    Ok((StatusCode::OK, Json(json!({"status":"ok","message":"Profile suspended successfully"}))))
}

async fn reenable_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role): Path<String>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "manage_profiles")?;
    let guard = state.store.0.lock();
    guard.reenable_profile(&role).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","message":"Profile re-enabled successfully"}))))
}

/// The wire shape of an account never includes the password hash.
fn public_user(user: &crate::storage::User) -> serde_json::Value {
    json!({
        "username": user.username,
        "email": user.email,
        "role": user.role,
        "suspended": user.suspended,
    })
}

// ---------- listings ----------

#[derive(Debug, Deserialize)]
struct CreateListingPayload { make: String, model: String, year: i32, price: f64 }

async fn create_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateListingPayload>,
) -> Result<impl IntoResponse, ErrResponse> {
    let principal = require_right(&state, &headers, "create_listing")?;
    let guard = state.store.0.lock();
    let listing = guard
        .create_listing(&payload.make, &payload.model, payload.year, payload.price, &principal.username)
        .map_err(|e| err_response(&e))?;
    Ok((StatusCode::CREATED, Json(json!({"status":"ok","listing": listing}))))
}

async fn update_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<ListingUpdate>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "update_listing")?;
    let guard = state.store.0.lock();
    let listing = guard.update_listing(id, &update).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","listing": listing}))))
}

async fn delete_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "delete_listing")?;
    let guard = state.store.0.lock();
    guard.delete_listing(id).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","message":"Listing deleted successfully"}))))
}

async fn view_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "view_listings")?;
    let guard = state.store.0.lock();
    let listings = guard.list_listings().map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","listings": listings}))))
}

async fn view_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "view_listings")?;
    let guard = state.store.0.lock();
    guard.record_listing_view(id).map_err(|e| err_response(&e))?;
    let listing = guard.get_listing(id).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","listing": listing}))))
}

async fn search_cars(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "search_cars")?;
    let guard = state.store.0.lock();
    let listings = guard.search_listings(&q.query).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","listings": listings}))))
}

async fn shortlist_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ErrResponse> {
    let principal = require_right(&state, &headers, "save_shortlist")?;
    let guard = state.store.0.lock();
    let added = guard.save_to_shortlist(&principal.username, id).map_err(|e| err_response(&e))?;
    // the seller-facing counter tracks distinct saves, so a re-save does
    // not inflate it
    let count = if added {
        guard.record_listing_shortlist(id).map_err(|e| err_response(&e))?
    } else {
        guard.get_listing(id).map_err(|e| err_response(&e))?.shortlists
    };
    Ok((StatusCode::OK, Json(json!({"status":"ok","added": added, "shortlists": count}))))
}

async fn view_shortlist(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ErrResponse> {
    let principal = require_right(&state, &headers, "view_shortlist")?;
    let guard = state.store.0.lock();
    let ids = guard.view_shortlist(&principal.username).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","shortlist": ids}))))
}

async fn search_shortlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<SearchQuery>,
) -> Result<impl IntoResponse, ErrResponse> {
    let principal = require_right(&state, &headers, "search_shortlist")?;
    let guard = state.store.0.lock();
    let listings = guard.search_shortlist(&principal.username, &q.query).map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","listings": listings}))))
}

#[derive(Debug, Deserialize)]
struct LoanPayload {
    listing_id: Uuid,
    annual_interest_rate: f64,
    term_months: u32,
    #[serde(default)]
    down_payment: f64,
}

async fn loan_calculator(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoanPayload>,
) -> Result<impl IntoResponse, ErrResponse> {
    require_right(&state, &headers, "use_loan_calculator")?;
    let listing = {
        let guard = state.store.0.lock();
        guard.get_listing(payload.listing_id).map_err(|e| err_response(&e))?
    };
    let terms = LoanTerms {
        principal: listing.price,
        annual_interest_rate: payload.annual_interest_rate,
        term_months: payload.term_months,
        down_payment: payload.down_payment,
    };
    let quote = terms.quote().map_err(|e| err_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"status":"ok","quote": quote}))))
}

async fn seller_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ErrResponse> {
    let principal = require_right(&state, &headers, "track_views")?;
    let guard = state.store.0.lock();
    let listings = guard.list_listings().map_err(|e| err_response(&e))?;
    let mine: Vec<_> = listings
        .into_iter()
        .filter(|l| l.seller == principal.username)
        .map(|l| json!({"id": l.id, "make": l.make, "model": l.model, "views": l.views, "shortlists": l.shortlists}))
        .collect();
    Ok((StatusCode::OK, Json(json!({"status":"ok","metrics": mine}))))
}
