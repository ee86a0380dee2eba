//! Rights catalog: the closed set of permission tokens granted through
//! profiles. Tokens are opaque, case-sensitive strings; membership is the
//! only operation the rest of the system needs.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Every permission token known to the system, grouped by the role bundle
/// that ships with a fresh install. The catalog is fixed at compile time;
/// profiles may mix tokens across bundles but may not invent new ones.
pub const ALL_RIGHTS: &[&str] = &[
    // user administration
    "create_user",
    "view_user",
    "update_user",
    "suspend_user",
    "search_user",
    "manage_profiles",
    // listing agents
    "create_listing",
    "view_listing",
    "update_listing",
    "delete_listing",
    "search_listing",
    // buyers
    "search_cars",
    "view_listings",
    "save_shortlist",
    "search_shortlist",
    "view_shortlist",
    "use_loan_calculator",
    // sellers
    "track_views",
    "track_shortlists",
    "rate_review_agents",
];

/// Role names seeded by default. User.role is not restricted to these; any
/// profile created at runtime introduces a new valid role name.
pub const DEFAULT_ROLES: &[&str] = &["user_admin", "used_car_agent", "buyer", "seller"];

static RIGHTS_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| ALL_RIGHTS.iter().copied().collect());

pub fn is_known(token: &str) -> bool {
    RIGHTS_SET.contains(token)
}

pub fn all() -> &'static [&'static str] {
    ALL_RIGHTS
}

/// The default rights bundle for one of the seeded roles, or None for roles
/// created at runtime.
pub fn default_bundle(role: &str) -> Option<&'static [&'static str]> {
    match role {
        "user_admin" => Some(&ALL_RIGHTS[0..6]),
        "used_car_agent" => Some(&ALL_RIGHTS[6..11]),
        "buyer" => Some(&ALL_RIGHTS[11..17]),
        "seller" => Some(&ALL_RIGHTS[17..20]),
        _ => None,
    }
}
