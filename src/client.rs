//! HTTP API client: the programmatic equivalent of the frontend service
//! layer. Login captures the session cookie and fills a `SessionSlot` so the
//! `RouteGuard` has a profile blob to read; every other call replays the
//! session token. Transport failures map to the `Network` error class and
//! propagate to the caller; nothing is swallowed.

use reqwest::Url;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::identity::{SessionSlot, StoredSession};
use crate::storage::listings::ListingUpdate;
use crate::storage::users::UserUpdate;

pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
    token: Option<String>,
    /// Client-side stored session blob, read by the route guard.
    pub slot: SessionSlot,
}

fn network_err(e: reqwest::Error) -> AppError {
    AppError::network("transport".into(), e.to_string())
}

impl ApiClient {
    pub fn new(base: &str) -> AppResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| AppError::validation("invalid_base_url".into(), e.to_string()))?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(network_err)?;
        Ok(Self { base, client, token: None, slot: SessionSlot::new() })
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base
            .join(path)
            .map_err(|e| AppError::validation("invalid_path".into(), e.to_string()))
    }

    /// Map a response to its JSON body, turning error envelopes back into
    /// the AppError taxonomy by status class.
    async fn handle(resp: reqwest::Response) -> AppResult<serde_json::Value> {
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or_else(|_| json!({}));
        if status.is_success() {
            return Ok(body);
        }
        let code = body.get("code").and_then(|c| c.as_str()).unwrap_or("remote_error").to_string();
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_else(|| status.as_str())
            .to_string();
        Err(match status.as_u16() {
            400 => AppError::validation(code, message),
            401 => AppError::auth(code, message),
            403 => AppError::forbidden(code, message),
            404 => AppError::not_found(code, message),
            409 => AppError::conflict(code, message),
            502 | 503 | 504 => AppError::network(code, message),
            _ => AppError::internal(code, message),
        })
    }

    /// Replay the session token on every request. The cookie store carries
    /// it too; the header keeps non-browser deployments behind proxies that
    /// strip cookies working.
    fn with_token(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(t) => req.header("x-session-token", t),
            None => req,
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> AppResult<serde_json::Value> {
        let req = self.with_token(self.client.post(self.url(path)?)).json(&body);
        Self::handle(req.send().await.map_err(network_err)?).await
    }

    async fn put(&self, path: &str, body: serde_json::Value) -> AppResult<serde_json::Value> {
        let req = self.with_token(self.client.put(self.url(path)?)).json(&body);
        Self::handle(req.send().await.map_err(network_err)?).await
    }

    async fn patch(&self, path: &str) -> AppResult<serde_json::Value> {
        let req = self.with_token(self.client.patch(self.url(path)?));
        Self::handle(req.send().await.map_err(network_err)?).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> AppResult<serde_json::Value> {
        let req = self.with_token(self.client.get(self.url(path)?)).query(query);
        Self::handle(req.send().await.map_err(network_err)?).await
    }

    async fn delete(&self, path: &str) -> AppResult<serde_json::Value> {
        let req = self.with_token(self.client.delete(self.url(path)?));
        Self::handle(req.send().await.map_err(network_err)?).await
    }

    // ---- auth ----

    /// Log in and persist the returned profile blob into the session slot.
    /// A non-object or token-less success payload is treated as a denial.
    pub async fn login(&mut self, username: &str, password: &str) -> AppResult<StoredSession> {
        let body = self
            .post("/api/login", json!({"username": username, "password": password}))
            .await?;
        let token = body.get("token").and_then(|t| t.as_str());
        let profile = body.get("profile");
        let (Some(token), Some(profile)) = (token, profile) else {
            return Err(AppError::auth("malformed_login", "login payload missing token or profile"));
        };
        let stored = StoredSession {
            username: profile.get("username").and_then(|v| v.as_str()).unwrap_or(username).to_string(),
            role: profile.get("role").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            rights: profile
                .get("rights")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|r| r.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            token: token.to_string(),
        };
        self.token = Some(stored.token.clone());
        self.slot.store_session(&stored);
        Ok(stored)
    }

    pub async fn logout(&mut self) -> AppResult<()> {
        let _ = self.post("/api/logout", json!({})).await?;
        self.token = None;
        self.slot.clear();
        Ok(())
    }

    // ---- user administration ----

    pub async fn create_user(&self, username: &str, password: &str, email: &str, role: &str) -> AppResult<serde_json::Value> {
        self.post(
            "/api/user_admin/create_user",
            json!({"username": username, "password": password, "email": email, "role": role}),
        )
        .await
    }

    pub async fn view_users(&self, username: Option<&str>) -> AppResult<serde_json::Value> {
        match username {
            Some(u) => self.get("/api/user_admin/view_users", &[("username", u)]).await,
            None => self.get("/api/user_admin/view_users", &[]).await,
        }
    }

    pub async fn search_users(&self, query: &str) -> AppResult<serde_json::Value> {
        self.get("/api/user_admin/search_users", &[("query", query)]).await
    }

    pub async fn update_user(&self, username: &str, update: &UserUpdate) -> AppResult<serde_json::Value> {
        let body = serde_json::to_value(update)
            .map_err(|e| AppError::internal("encode".into(), e.to_string()))?;
        self.put(&format!("/api/user_admin/update_user/{}", username), body).await
    }

    pub async fn suspend_user(&self, username: &str) -> AppResult<serde_json::Value> {
        self.patch(&format!("/api/user_admin/suspend_user/{}", username)).await
    }

    pub async fn reenable_user(&self, username: &str) -> AppResult<serde_json::Value> {
        self.patch(&format!("/api/user_admin/reenable_user/{}", username)).await
    }

    pub async fn create_profile(&self, role: &str, rights: &[&str]) -> AppResult<serde_json::Value> {
        self.post("/api/user_admin/create_profile", json!({"role": role, "rights": rights})).await
    }

    pub async fn view_profiles(&self, role: Option<&str>) -> AppResult<serde_json::Value> {
        match role {
            Some(r) => self.get("/api/user_admin/view_profiles", &[("role", r)]).await,
            None => self.get("/api/user_admin/view_profiles", &[]).await,
        }
    }

    pub async fn search_profiles(&self, query: &str) -> AppResult<serde_json::Value> {
        self.get("/api/user_admin/search_profiles", &[("query", query)]).await
    }

    pub async fn update_profile(&self, role: &str, rights: &[&str]) -> AppResult<serde_json::Value> {
        self.put(&format!("/api/user_admin/update_profile/{}", role), json!({"rights": rights})).await
    }

    pub async fn suspend_profile(&self, role: &str) -> AppResult<serde_json::Value> {
        self.patch(&format!("/api/user_admin/suspend_profile/{}", role)).await
    }

    pub async fn reenable_profile(&self, role: &str) -> AppResult<serde_json::Value> {
        self.patch(&format!("/api/user_admin/reenable_profile/{}", role)).await
    }

    // ---- listings & loan ----

    pub async fn create_listing(&self, make: &str, model: &str, year: i32, price: f64) -> AppResult<serde_json::Value> {
        self.post(
            "/api/agent/create_listing",
            json!({"make": make, "model": model, "year": year, "price": price}),
        )
        .await
    }

    pub async fn update_listing(&self, id: &str, update: &ListingUpdate) -> AppResult<serde_json::Value> {
        let body = serde_json::to_value(update)
            .map_err(|e| AppError::internal("encode".into(), e.to_string()))?;
        self.put(&format!("/api/agent/update_listing/{}", id), body).await
    }

    pub async fn view_listings(&self) -> AppResult<serde_json::Value> {
        self.get("/api/buyer/view_listings", &[]).await
    }

    /// View one listing; the server bumps its view counter as a side effect.
    pub async fn view_listing(&self, id: &str) -> AppResult<serde_json::Value> {
        self.get(&format!("/api/buyer/view_listing/{}", id), &[]).await
    }

    pub async fn shortlist(&self, id: &str) -> AppResult<serde_json::Value> {
        self.post(&format!("/api/buyer/shortlist/{}", id), json!({})).await
    }

    pub async fn view_shortlist(&self) -> AppResult<serde_json::Value> {
        self.get("/api/buyer/view_shortlist", &[]).await
    }

    pub async fn search_shortlist(&self, query: &str) -> AppResult<serde_json::Value> {
        self.get("/api/buyer/search_shortlist", &[("query", query)]).await
    }

    pub async fn search_cars(&self, query: &str) -> AppResult<serde_json::Value> {
        self.get("/api/buyer/search_cars", &[("query", query)]).await
    }

    pub async fn delete_listing(&self, id: &str) -> AppResult<serde_json::Value> {
        self.delete(&format!("/api/agent/delete_listing/{}", id)).await
    }

    pub async fn loan_quote(&self, listing_id: &str, rate: f64, term_months: u32, down_payment: f64) -> AppResult<serde_json::Value> {
        self.post(
            "/api/buyer/loan_calculator",
            json!({
                "listing_id": listing_id,
                "annual_interest_rate": rate,
                "term_months": term_months,
                "down_payment": down_payment,
            }),
        )
        .await
    }

    pub async fn seller_metrics(&self) -> AppResult<serde_json::Value> {
        self.get("/api/seller/metrics", &[]).await
    }
}
