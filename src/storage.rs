//!
//! motormart storage module
//! ------------------------
//! On-disk store for the marketplace catalogs using one JSON file per
//! collection under a configured root folder: `profiles.json`, `users.json`
//! and `listings.json`. Each file holds the full collection in insertion
//! order; every operation reads the file, applies the change and rewrites it.
//! The collections are small administrative catalogs, so whole-file rewrites
//! keep the store trivially crash-consistent without a journal.
//!
//! The public API centers around the `Store` type, which is wrapped in a
//! thread-safe `SharedStore` (`Arc<Mutex<Store>>`) by the server and tests.
//! All domain contracts (profile/user/listing operations) live in the
//! `profiles`, `users` and `listings` submodules as `impl Store` blocks.

use std::{fs, path::{Path, PathBuf}};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

pub mod profiles;
pub mod users;
pub mod listings;
pub mod shortlists;

pub use profiles::Profile;
pub use users::User;
pub use listings::Listing;
pub use shortlists::Shortlist;

/// Core on-disk storage handle rooted at a data folder.
pub struct Store {
    root: PathBuf,
}

/// Thread-safe shared handle to the store. Clones are cheap.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        Ok(SharedStore(Arc::new(Mutex::new(Store::new(root)?))))
    }
}

impl Store {
    /// Create a new Store rooted at the given filesystem path.
    /// The directory is created if it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| AppError::internal("store_init".into(), format!("create root {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root_path(&self) -> &PathBuf { &self.root }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    /// Read a whole collection. A missing file is an empty collection.
    pub(crate) fn read_collection<T: DeserializeOwned>(&self, name: &str) -> AppResult<Vec<T>> {
        let path = self.collection_path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path)
            .map_err(|e| AppError::internal("store_read".into(), format!("read {}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::internal("store_decode".into(), format!("decode {}: {}", path.display(), e)))
    }

    /// Rewrite a whole collection atomically (write to a temp file, rename).
    pub(crate) fn write_collection<T: Serialize>(&self, name: &str, items: &[T]) -> AppResult<()> {
        let path = self.collection_path(name);
        let tmp = self.root.join(format!("{}.json.tmp", name));
        let bytes = serde_json::to_vec_pretty(items)
            .map_err(|e| AppError::internal("store_encode".into(), format!("encode {}: {}", name, e)))?;
        fs::write(&tmp, bytes)
            .map_err(|e| AppError::internal("store_write".into(), format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| AppError::internal("store_write".into(), format!("rename {}: {}", path.display(), e)))?;
        debug!(target: "motormart::storage", "wrote collection '{}' ({} records)", name, items.len());
        Ok(())
    }
}

/// Build the case-insensitive matcher the search operations share. The query
/// is matched literally; a blank query is rejected before any file IO.
pub(crate) fn search_matcher(query: &str) -> AppResult<Regex> {
    if query.trim().is_empty() {
        return Err(AppError::validation("empty_query", "query parameter is required"));
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::internal("search_matcher".into(), format!("build matcher: {}", e)))
}
