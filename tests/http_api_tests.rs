//! HTTP API tests over a live listener: login, administration round-trips,
//! authorization denials and the fail-closed session behavior after an
//! administrative suspend.

use std::sync::Arc;

use anyhow::Result;
use tempfile::{tempdir, TempDir};

use motormart::client::ApiClient;
use motormart::error::AppError;
use motormart::identity::SessionManager;
use motormart::server::{ensure_seed_data, router, AppState};
use motormart::storage::listings::ListingUpdate;
use motormart::storage::SharedStore;

/// Serve the router on an ephemeral port over a temp store seeded with the
/// default profiles and the bootstrap admin.
async fn spawn_server() -> Result<(String, TempDir)> {
    let tmp = tempdir()?;
    let store = SharedStore::new(tmp.path())?;
    ensure_seed_data(&store)?;
    let state = AppState { store, sessions: Arc::new(SessionManager::default()) };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{}", addr), tmp))
}

async fn admin_client(base: &str) -> Result<ApiClient> {
    let mut client = ApiClient::new(base)?;
    client.login("admin", "motormart").await?;
    Ok(client)
}

#[tokio::test]
async fn login_rejects_bad_credentials() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let mut client = ApiClient::new(&base)?;

    let err = client.login("admin", "wrong").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }), "got {err:?}");

    let err = client.login("nobody", "whatever").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    Ok(())
}

#[tokio::test]
async fn login_fills_the_session_slot_for_the_guard() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let mut client = ApiClient::new(&base)?;
    let stored = client.login("admin", "motormart").await?;
    assert_eq!(stored.role, "user_admin");
    assert!(stored.rights.contains(&"create_user".to_string()));
    assert!(client.slot.load().is_some());

    client.logout().await?;
    assert!(client.slot.load().is_none());
    Ok(())
}

#[tokio::test]
async fn admin_round_trip_users_and_profiles() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;

    // profile lifecycle
    let created = admin.create_profile("premium_buyer", &["view_listings", "search_cars"]).await?;
    assert_eq!(created["profile"]["role"], "premium_buyer");

    let dup = admin.create_profile("premium_buyer", &["view_listings"]).await.unwrap_err();
    assert!(matches!(dup, AppError::Validation { .. }));

    let bad = admin.create_profile("broken", &[]).await.unwrap_err();
    assert!(matches!(bad, AppError::Validation { .. }));

    let one = admin.view_profiles(Some("premium_buyer")).await?;
    assert_eq!(one["profiles"][0]["rights"][0], "view_listings");

    let updated = admin.update_profile("premium_buyer", &["save_shortlist"]).await?;
    assert_eq!(updated["profile"]["rights"], serde_json::json!(["save_shortlist"]));

    let missing = admin.view_profiles(Some("no_such_role")).await.unwrap_err();
    assert!(matches!(missing, AppError::NotFound { .. }));

    // user lifecycle; read-your-writes on the follow-up view
    admin.create_user("carol", "pw12345", "carol@example.com", "premium_buyer").await?;
    let users = admin.view_users(Some("carol")).await?;
    assert_eq!(users["users"][0]["email"], "carol@example.com");
    // password hashes never leave the server
    assert!(users["users"][0].get("password_hash").is_none());

    let found = admin.search_users("carol@").await?;
    assert_eq!(found["users"].as_array().map(|a| a.len()), Some(1));
    Ok(())
}

#[tokio::test]
async fn missing_right_is_forbidden_not_unauthorized() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;
    admin.create_user("bob", "hunter2", "bob@example.com", "buyer").await?;

    let mut bob = ApiClient::new(&base)?;
    bob.login("bob", "hunter2").await?;

    // a buyer holds no admin rights
    let err = bob.view_users(None).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }), "got {err:?}");

    // but keeps the rights of its own bundle
    let listings = bob.view_listings().await?;
    assert_eq!(listings["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn no_session_is_unauthorized() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let anon = ApiClient::new(&base)?;
    let err = anon.view_listings().await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    Ok(())
}

#[tokio::test]
async fn suspending_a_user_kills_the_live_session() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;
    admin.create_user("dave", "pw12345", "dave@example.com", "buyer").await?;

    let mut dave = ApiClient::new(&base)?;
    dave.login("dave", "pw12345").await?;
    assert_eq!(dave.view_listings().await?["status"], "ok");

    admin.suspend_user("dave").await?;
    // second suspend is a defined no-op, not an error
    admin.suspend_user("dave").await?;

    let err = dave.view_listings().await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }), "got {err:?}");

    // re-enable restores login
    admin.reenable_user("dave").await?;
    dave.login("dave", "pw12345").await?;
    assert_eq!(dave.view_listings().await?["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn profile_suspension_cascades_over_http() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;
    admin.create_user("amy", "pw12345", "amy@example.com", "used_car_agent").await?;

    let mut amy = ApiClient::new(&base)?;
    amy.login("amy", "pw12345").await?;
    amy.create_listing("Toyota", "Corolla", 2019, 15000.0).await?;

    admin.suspend_profile("used_car_agent").await?;

    // amy's own account is untouched, yet access is gone and login denied
    let err = amy.create_listing("Honda", "Civic", 2020, 18000.0).await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }), "got {err:?}");
    let err = amy.login("amy", "pw12345").await.unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));

    admin.reenable_profile("used_car_agent").await?;
    amy.login("amy", "pw12345").await?;
    assert_eq!(amy.create_listing("Honda", "Civic", 2020, 18000.0).await?["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn buyer_loan_flow_over_listing_price() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;
    admin.create_user("amy", "pw12345", "amy@example.com", "used_car_agent").await?;
    admin.create_user("bob", "pw12345", "bob@example.com", "buyer").await?;

    let mut amy = ApiClient::new(&base)?;
    amy.login("amy", "pw12345").await?;
    let listing = amy.create_listing("Ford", "F-150", 2018, 12000.0).await?;
    let id = listing["listing"]["id"].as_str().unwrap().to_string();

    // an agent may reprice their own listing before any quote is taken
    let repriced = amy
        .update_listing(&id, &ListingUpdate { price: Some(12000.0), ..ListingUpdate::default() })
        .await?;
    assert_eq!(repriced["listing"]["price"], 12000.0);

    let mut bob = ApiClient::new(&base)?;
    bob.login("bob", "pw12345").await?;

    // zero-rate loan over the listing price is straight division
    let quote = bob.loan_quote(&id, 0.0, 12, 0.0).await?;
    assert_eq!(quote["quote"]["monthly_payment"], 1000.0);
    assert_eq!(quote["quote"]["total_interest"], 0.0);

    // an agent lacks the loan calculator right
    let err = amy.loan_quote(&id, 0.0, 12, 0.0).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    // unknown listing aborts with not-found
    let err = bob
        .loan_quote("00000000-0000-0000-0000-000000000000", 0.0, 12, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn buyer_shortlist_is_per_user_and_idempotent() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;
    admin.create_user("amy", "pw12345", "amy@example.com", "used_car_agent").await?;
    admin.create_user("bob", "pw12345", "bob@example.com", "buyer").await?;
    admin.create_user("carol", "pw12345", "carol@example.com", "buyer").await?;

    let mut amy = ApiClient::new(&base)?;
    amy.login("amy", "pw12345").await?;
    let corolla = amy.create_listing("Toyota", "Corolla", 2019, 15000.0).await?["listing"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let civic = amy.create_listing("Honda", "Civic", 2020, 18000.0).await?["listing"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut bob = ApiClient::new(&base)?;
    bob.login("bob", "pw12345").await?;
    let first = bob.shortlist(&corolla).await?;
    assert_eq!(first["added"], true);
    // re-saving is a no-op success and does not inflate the counter
    let second = bob.shortlist(&corolla).await?;
    assert_eq!(second["added"], false);
    assert_eq!(second["shortlists"], 1);
    bob.shortlist(&civic).await?;

    let mut carol = ApiClient::new(&base)?;
    carol.login("carol", "pw12345").await?;
    carol.shortlist(&civic).await?;

    // each buyer sees only their own saved set, in save order
    let bobs = bob.view_shortlist().await?;
    assert_eq!(bobs["shortlist"], serde_json::json!([corolla.clone(), civic.clone()]));
    let carols = carol.view_shortlist().await?;
    assert_eq!(carols["shortlist"], serde_json::json!([civic.clone()]));

    // search runs over the caller's saved set, not the whole catalog
    let hits = carol.search_shortlist("20").await?;
    assert_eq!(hits["listings"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(hits["listings"][0]["model"], "Civic");

    // agents hold none of the shortlist rights
    let err = amy.view_shortlist().await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
    let err = amy.search_shortlist("civic").await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
    Ok(())
}

#[tokio::test]
async fn seller_metrics_count_views_and_shortlists() -> Result<()> {
    let (base, _tmp) = spawn_server().await?;
    let admin = admin_client(&base).await?;
    admin.create_user("sam", "pw12345", "sam@example.com", "used_car_agent").await?;
    admin.create_user("bob", "pw12345", "bob@example.com", "buyer").await?;

    let mut sam = ApiClient::new(&base)?;
    sam.login("sam", "pw12345").await?;
    let listing = sam.create_listing("BMW", "3 Series", 2021, 30000.0).await?;
    let id = listing["listing"]["id"].as_str().unwrap().to_string();

    let mut bob = ApiClient::new(&base)?;
    bob.login("bob", "pw12345").await?;
    let found = bob.search_cars("bmw").await?;
    assert_eq!(found["listings"].as_array().map(|a| a.len()), Some(1));

    // metrics require track_views; the agent bundle does not carry it
    let err = sam.seller_metrics().await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    bob.view_listing(&id).await?;
    bob.view_listing(&id).await?;
    bob.shortlist(&id).await?;

    // granting the right takes effect on sam's very next request, no
    // re-login needed
    admin
        .update_profile(
            "used_car_agent",
            &["create_listing", "view_listing", "update_listing", "delete_listing", "search_listing", "track_views"],
        )
        .await?;
    let metrics = sam.seller_metrics().await?;
    assert_eq!(metrics["metrics"][0]["views"], 2);
    assert_eq!(metrics["metrics"][0]["shortlists"], 1);
    Ok(())
}
