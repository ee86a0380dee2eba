//! Used-car listing catalog: plain CRUD plus the view/shortlist counters
//! the seller metrics pages read. No access-control logic lives here; the
//! HTTP layer gates every operation through the authorizer first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use super::Store;

const COLLECTION: &str = "listings";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    /// Username of the selling account.
    pub seller: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub shortlists: u64,
    pub created_at: DateTime<Utc>,
}

/// Mutable listing fields; absent fields are left as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price: Option<f64>,
}

impl Store {
    pub fn create_listing(&self, make: &str, model: &str, year: i32, price: f64, seller: &str) -> AppResult<Listing> {
        for (field, value) in [("make", make), ("model", model), ("seller", seller)] {
            if value.trim().is_empty() {
                return Err(AppError::validation("missing_field".into(), format!("{} is required", field)));
            }
        }
        if price <= 0.0 {
            return Err(AppError::validation("invalid_price", "price must be greater than 0"));
        }
        let listing = Listing {
            id: Uuid::new_v4(),
            make: make.to_string(),
            model: model.to_string(),
            year,
            price,
            seller: seller.to_string(),
            views: 0,
            shortlists: 0,
            created_at: Utc::now(),
        };
        let mut all: Vec<Listing> = self.read_collection(COLLECTION)?;
        all.push(listing.clone());
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::listings", "listing created id={} {} {}", listing.id, make, model);
        Ok(listing)
    }

    pub fn get_listing(&self, id: Uuid) -> AppResult<Listing> {
        let all: Vec<Listing> = self.read_collection(COLLECTION)?;
        all.into_iter()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::not_found("listing_not_found".into(), format!("listing '{}' not found", id)))
    }

    pub fn list_listings(&self) -> AppResult<Vec<Listing>> {
        self.read_collection(COLLECTION)
    }

    pub fn update_listing(&self, id: Uuid, update: &ListingUpdate) -> AppResult<Listing> {
        let mut all: Vec<Listing> = self.read_collection(COLLECTION)?;
        let Some(l) = all.iter_mut().find(|l| l.id == id) else {
            return Err(AppError::not_found("listing_not_found".into(), format!("listing '{}' not found", id)));
        };
        if let Some(make) = &update.make { l.make = make.clone(); }
        if let Some(model) = &update.model { l.model = model.clone(); }
        if let Some(year) = update.year { l.year = year; }
        if let Some(price) = update.price {
            if price <= 0.0 {
                return Err(AppError::validation("invalid_price", "price must be greater than 0"));
            }
            l.price = price;
        }
        let updated = l.clone();
        self.write_collection(COLLECTION, &all)?;
        Ok(updated)
    }

    /// Listings, unlike accounts and profiles, are physically deleted.
    pub fn delete_listing(&self, id: Uuid) -> AppResult<()> {
        let mut all: Vec<Listing> = self.read_collection(COLLECTION)?;
        let before = all.len();
        all.retain(|l| l.id != id);
        if all.len() == before {
            return Err(AppError::not_found("listing_not_found".into(), format!("listing '{}' not found", id)));
        }
        self.write_collection(COLLECTION, &all)?;
        info!(target: "motormart::listings", "listing deleted id={}", id);
        Ok(())
    }

    /// Case-insensitive substring search over make, model and year.
    pub fn search_listings(&self, query: &str) -> AppResult<Vec<Listing>> {
        let matcher = super::search_matcher(query)?;
        let all: Vec<Listing> = self.read_collection(COLLECTION)?;
        Ok(all
            .into_iter()
            .filter(|l| {
                matcher.is_match(&l.make)
                    || matcher.is_match(&l.model)
                    || matcher.is_match(&l.year.to_string())
            })
            .collect())
    }

    pub fn record_listing_view(&self, id: Uuid) -> AppResult<u64> {
        self.bump_counter(id, |l| { l.views += 1; l.views })
    }

    pub fn record_listing_shortlist(&self, id: Uuid) -> AppResult<u64> {
        self.bump_counter(id, |l| { l.shortlists += 1; l.shortlists })
    }

    fn bump_counter(&self, id: Uuid, f: impl FnOnce(&mut Listing) -> u64) -> AppResult<u64> {
        let mut all: Vec<Listing> = self.read_collection(COLLECTION)?;
        let Some(l) = all.iter_mut().find(|l| l.id == id) else {
            return Err(AppError::not_found("listing_not_found".into(), format!("listing '{}' not found", id)));
        };
        let value = f(l);
        self.write_collection(COLLECTION, &all)?;
        Ok(value)
    }
}
