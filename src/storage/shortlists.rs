//! Per-buyer shortlists: each buyer keeps a saved set of listing ids.
//! Saving is idempotent (a listing already in the set is a no-op success);
//! viewing returns the ids, searching filters the saved listings by the
//! same make/model/year matcher the public catalog search uses.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use super::{Listing, Store};

const COLLECTION: &str = "shortlists";

/// One buyer's saved listing set, in save order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shortlist {
    pub username: String,
    pub listing_ids: Vec<Uuid>,
}

impl Store {
    /// Add a listing to the buyer's shortlist. The listing must exist.
    /// Returns true when the set actually grew, false when it was already
    /// saved.
    pub fn save_to_shortlist(&self, username: &str, listing_id: Uuid) -> AppResult<bool> {
        self.get_listing(listing_id)?;
        let mut all: Vec<Shortlist> = self.read_collection(COLLECTION)?;
        let idx = match all.iter().position(|s| s.username == username) {
            Some(i) => i,
            None => {
                all.push(Shortlist { username: username.to_string(), listing_ids: Vec::new() });
                all.len() - 1
            }
        };
        if all[idx].listing_ids.contains(&listing_id) {
            return Ok(false);
        }
        all[idx].listing_ids.push(listing_id);
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::shortlists", "shortlist save user='{}' listing={}", username, listing_id);
        Ok(true)
    }

    /// The buyer's saved listing ids in save order. A buyer who never saved
    /// anything has an empty shortlist, not an error.
    pub fn view_shortlist(&self, username: &str) -> AppResult<Vec<Uuid>> {
        let all: Vec<Shortlist> = self.read_collection(COLLECTION)?;
        Ok(all
            .into_iter()
            .find(|s| s.username == username)
            .map(|s| s.listing_ids)
            .unwrap_or_default())
    }

    /// Search within the buyer's saved listings over make, model and year.
    pub fn search_shortlist(&self, username: &str, query: &str) -> AppResult<Vec<Listing>> {
        let matcher = super::search_matcher(query)?;
        let ids = self.view_shortlist(username)?;
        let all = self.list_listings()?;
        Ok(all
            .into_iter()
            .filter(|l| ids.contains(&l.id))
            .filter(|l| {
                matcher.is_match(&l.make)
                    || matcher.is_match(&l.model)
                    || matcher.is_match(&l.year.to_string())
            })
            .collect())
    }
}
