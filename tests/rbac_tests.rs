//! RBAC integration tests: store contracts, the authorization decision
//! procedure, cascading suspension and the login provider. These exercise
//! positive and negative paths across the catalogs.

use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;

use motormart::error::AppError;
use motormart::identity::{
    check_right, check_role, AuthProvider, Decision, DenyReason, LocalAuthProvider, LoginRequest,
    SessionManager,
};
use motormart::storage::{SharedStore, Store};

fn rights(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
}

#[test]
fn profile_create_enforces_catalog_and_uniqueness() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;

    store.create_profile("agent", &rights(&["view_listings"]))?;

    // duplicate role
    let dup = store.create_profile("agent", &rights(&["view_listings"]));
    assert!(matches!(dup, Err(AppError::Validation { .. })));

    // empty rights
    let empty = store.create_profile("ghost", &[]);
    assert!(matches!(empty, Err(AppError::Validation { .. })));

    // unknown token
    let unknown = store.create_profile("hacker", &rights(&["drop_tables"]));
    assert!(matches!(unknown, Err(AppError::Validation { .. })));

    // only the valid profile exists, in insertion order
    let all = store.list_profiles(None)?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].role, "agent");
    assert!(!all[0].suspended);
    Ok(())
}

#[test]
fn profile_update_is_full_replace_and_never_empty() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_profile("buyer", &rights(&["view_listings", "search_cars"]))?;

    let updated = store.update_profile_rights("buyer", &rights(&["save_shortlist"]))?;
    assert_eq!(updated.rights, rights(&["save_shortlist"]));

    // an update that would leave the set empty is rejected and changes nothing
    let err = store.update_profile_rights("buyer", &[]);
    assert!(matches!(err, Err(AppError::Validation { .. })));
    assert_eq!(store.get_profile("buyer")?.rights, rights(&["save_shortlist"]));

    let missing = store.update_profile_rights("nobody", &rights(&["view_listings"]));
    assert!(matches!(missing, Err(AppError::NotFound { .. })));
    Ok(())
}

#[test]
fn suspend_and_reenable_are_idempotent() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_profile("seller", &rights(&["track_views"]))?;
    store.create_user("sam", "pw", "sam@example.com", "seller")?;

    store.suspend_profile("seller")?;
    store.suspend_profile("seller")?; // second call: no-op, no error
    assert!(store.get_profile("seller")?.suspended);

    store.reenable_profile("seller")?;
    store.reenable_profile("seller")?;
    assert!(!store.get_profile("seller")?.suspended);

    store.suspend_user("sam")?;
    store.suspend_user("sam")?;
    assert!(store.get_user("sam")?.suspended);
    store.reenable_user("sam")?;
    store.reenable_user("sam")?;
    assert!(!store.get_user("sam")?.suspended);

    assert!(matches!(store.suspend_profile("nobody"), Err(AppError::NotFound { .. })));
    assert!(matches!(store.suspend_user("nobody"), Err(AppError::NotFound { .. })));
    Ok(())
}

#[test]
fn user_create_validates_fields_but_not_role_reference() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;

    // role 'phantom' has no profile; creation still succeeds
    let u = store.create_user("alice", "pw", "alice@example.com", "phantom")?;
    assert_eq!(u.role, "phantom");

    let dup = store.create_user("alice", "pw2", "other@example.com", "buyer");
    assert!(matches!(dup, Err(AppError::Validation { .. })));

    let blank = store.create_user("bob", "", "bob@example.com", "buyer");
    assert!(matches!(blank, Err(AppError::Validation { .. })));

    // the dangling reference denies at authorization time instead
    let d = check_right(&store, "alice", "view_listings")?;
    assert_eq!(d, Decision::Deny(DenyReason::ProfileNotFound));
    Ok(())
}

#[test]
fn user_update_is_partial() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_user("carol", "pw", "carol@example.com", "buyer")?;

    let updated = store.update_user(
        "carol",
        &motormart::storage::users::UserUpdate { email: Some("new@example.com".into()), role: None },
    )?;
    assert_eq!(updated.email, "new@example.com");
    assert_eq!(updated.role, "buyer");

    let updated = store.update_user(
        "carol",
        &motormart::storage::users::UserUpdate { email: None, role: Some("seller".into()) },
    )?;
    assert_eq!(updated.email, "new@example.com");
    assert_eq!(updated.role, "seller");
    Ok(())
}

#[test]
fn authorization_decision_matrix() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_profile("buyer", &rights(&["view_listings", "search_cars"]))?;
    store.create_user("alice", "pw", "alice@example.com", "buyer")?;

    assert_eq!(check_right(&store, "ghost", "view_listings")?, Decision::Deny(DenyReason::UserNotFound));
    assert_eq!(check_right(&store, "alice", "view_listings")?, Decision::Allow);
    assert_eq!(check_right(&store, "alice", "create_user")?, Decision::Deny(DenyReason::RightNotGranted));

    assert_eq!(check_role(&store, "alice", &["buyer", "seller"])?, Decision::Allow);
    assert_eq!(check_role(&store, "alice", &["seller"])?, Decision::Deny(DenyReason::RoleMismatch));

    store.suspend_user("alice")?;
    assert_eq!(check_right(&store, "alice", "view_listings")?, Decision::Deny(DenyReason::UserSuspended));
    store.reenable_user("alice")?;
    assert_eq!(check_right(&store, "alice", "view_listings")?, Decision::Allow);
    Ok(())
}

#[test]
fn profile_suspension_cascades_without_flipping_user_flags() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_profile("seller", &rights(&["track_views"]))?;
    store.create_user("alice", "pw", "alice@example.com", "seller")?;

    store.suspend_profile("seller")?;

    // the user's own flag stays false, yet access is denied
    assert!(!store.get_user("alice")?.suspended);
    assert_eq!(check_right(&store, "alice", "track_views")?, Decision::Deny(DenyReason::ProfileSuspended));
    assert_eq!(check_role(&store, "alice", &["seller"])?, Decision::Deny(DenyReason::ProfileSuspended));

    store.reenable_profile("seller")?;
    assert_eq!(check_right(&store, "alice", "track_views")?, Decision::Allow);
    Ok(())
}

#[test]
fn reenable_restores_current_rights_not_snapshot() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_profile("buyer", &rights(&["view_listings"]))?;
    store.create_user("alice", "pw", "alice@example.com", "buyer")?;

    store.suspend_profile("buyer")?;
    // the rights change while the profile is suspended
    store.update_profile_rights("buyer", &rights(&["search_cars"]))?;
    store.reenable_profile("buyer")?;

    assert_eq!(check_right(&store, "alice", "search_cars")?, Decision::Allow);
    assert_eq!(check_right(&store, "alice", "view_listings")?, Decision::Deny(DenyReason::RightNotGranted));
    Ok(())
}

#[test]
fn search_is_case_insensitive_substring() -> Result<()> {
    let tmp = tempdir()?;
    let store = Store::new(tmp.path())?;
    store.create_profile("used_car_agent", &rights(&["create_listing"]))?;
    store.create_profile("buyer", &rights(&["view_listings"]))?;
    store.create_user("agent_amy", "pw", "amy@cars.example", "used_car_agent")?;
    store.create_user("buyer_bob", "pw", "bob@example.com", "buyer")?;

    let profiles = store.search_profiles("AGENT")?;
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].role, "used_car_agent");

    // matches rights tokens too
    let by_right = store.search_profiles("view_list")?;
    assert_eq!(by_right.len(), 1);
    assert_eq!(by_right[0].role, "buyer");

    let users = store.search_users("cars.example")?;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "agent_amy");

    assert!(store.search_users("").is_err());
    Ok(())
}

#[test]
fn login_provider_rejects_suspended_and_issues_fresh_sessions() -> Result<()> {
    let tmp = tempdir()?;
    let shared = SharedStore::new(tmp.path())?;
    {
        let guard = shared.0.lock();
        guard.create_profile("buyer", &rights(&["view_listings"]))?;
        guard.create_user("alice", "s3cr3t!", "alice@example.com", "buyer")?;
    }
    let sessions = Arc::new(SessionManager::default());
    let provider = LocalAuthProvider::new(shared.clone(), sessions.clone());

    // wrong password
    let bad = provider.login(&LoginRequest { username: "alice".into(), password: "wrong".into() });
    assert!(bad.is_err());

    // good credentials
    let resp = provider.login(&LoginRequest { username: "alice".into(), password: "s3cr3t!".into() })?;
    assert_eq!(resp.session.principal.role, "buyer");
    assert!(sessions.validate(&resp.session.token).is_some());

    // suspended user cannot log in
    shared.0.lock().suspend_user("alice")?;
    let denied = provider.login(&LoginRequest { username: "alice".into(), password: "s3cr3t!".into() });
    assert!(denied.is_err());
    shared.0.lock().reenable_user("alice")?;

    // suspended profile cascades into the login gate too
    shared.0.lock().suspend_profile("buyer")?;
    let denied = provider.login(&LoginRequest { username: "alice".into(), password: "s3cr3t!".into() });
    assert!(denied.is_err());
    Ok(())
}

#[test]
fn end_to_end_agent_scenario() -> Result<()> {
    let tmp = tempdir()?;
    let shared = SharedStore::new(tmp.path())?;
    {
        let guard = shared.0.lock();
        guard.create_profile("agent", &rights(&["view_listings"]))?;
        guard.create_user("bob", "hunter2", "bob@example.com", "agent")?;
    }
    let sessions = Arc::new(SessionManager::default());
    let provider = LocalAuthProvider::new(shared.clone(), sessions.clone());

    let resp = provider.login(&LoginRequest { username: "bob".into(), password: "hunter2".into() })?;
    assert_eq!(resp.session.principal.username, "bob");
    motormart::tprintln!("issued session {} for bob", resp.session.session_id);

    let guard = shared.0.lock();
    assert_eq!(check_right(&guard, "bob", "view_listings")?, Decision::Allow);
    assert_eq!(check_right(&guard, "bob", "create_user")?, Decision::Deny(DenyReason::RightNotGranted));
    Ok(())
}
