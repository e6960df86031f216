//! Transactional catalog of assets, representations, metadata and tags.
//!
//! Backed by one SQLite file. Two connections are kept open:
//!
//! - a **writer**, serialized behind a mutex, used by [`Catalog::transaction`];
//! - a **reader** for queries, which in WAL mode sees the last committed
//!   snapshot even while a write transaction is in progress.
//!
//! ## Transactions
//!
//! A transaction body runs with exclusive write access and either commits
//! as a whole (body returned `Ok`) or rolls back (body returned `Err`).
//! Opening a second transaction from inside a body on the same thread fails
//! with [`CatalogError::Transaction`]; other threads wait their turn.
//!
//! ## Observation
//!
//! [`Catalog::observe`] registers a callback against an [`AssetRequest`].
//! After every commit the request is re-run on the committing thread and the
//! callback receives a positional [`ChangeSet`] if anything in its result
//! set changed. Callbacks run inside the writer's critical section, so they
//! see commits in order; a callback that tries to write gets
//! [`CatalogError::Transaction`] instead of deadlocking.

pub mod changes;
pub mod model;
pub mod query;
mod schema;

pub use changes::ChangeSet;
pub use model::{Asset, AssetOrigin, Representation, RepresentationType, Tag, TagType};
pub use query::{AssetRequest, Predicate, Results, SortKey};

use rusqlite::{Connection, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid catalog file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },
    #[error("A write transaction is already open on this thread")]
    Transaction,
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Asset not found: {0}")]
    NotFound(Uuid),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle returned by [`Catalog::observe`]; pass it to
/// [`Catalog::stop_observing`] to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationToken(u64);

type ChangeCallback = Box<dyn FnMut(&ChangeSet, &[Asset]) + Send>;

struct Observer {
    token: NotificationToken,
    request: AssetRequest,
    snapshot: Vec<Asset>,
    callback: ChangeCallback,
}

#[derive(Default)]
struct Observers {
    next_token: u64,
    active: Vec<Observer>,
    /// Tokens of observers checked out for notification.
    notifying: Vec<NotificationToken>,
    /// Tokens removed while their observer was checked out for notification.
    cancelled: Vec<NotificationToken>,
}

/// Observers taken out of the registry for one round of notification.
/// Dropping it puts them back, minus any stopped in the meantime, even when
/// a callback panics.
struct CheckedOut<'a> {
    registry: &'a Mutex<Observers>,
    observers: Vec<Observer>,
}

impl Drop for CheckedOut<'_> {
    fn drop(&mut self) {
        let mut registry = lock(self.registry);
        let cancelled = std::mem::take(&mut registry.cancelled);
        registry.notifying.clear();
        let mut restored = std::mem::take(&mut self.observers);
        restored.retain(|o| !cancelled.contains(&o.token));
        restored.append(&mut registry.active);
        registry.active = restored;
    }
}

/// Clears the write owner when a transaction ends, however it ends.
struct OwnerGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

pub struct Catalog {
    path: PathBuf,
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    write_owner: Mutex<Option<ThreadId>>,
    observers: Mutex<Observers>,
}

impl Catalog {
    /// Open the catalog at `path`, creating it if absent.
    ///
    /// Fails with [`CatalogError::InvalidFile`] when `path` exists but is not
    /// a catalog this version can read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(CatalogError::InvalidFile {
                path: path.to_path_buf(),
                reason: "is a directory".into(),
            });
        }
        let mut writer = schema::connect(path)?;
        schema::migrate(&mut writer, path)?;
        let reader = schema::connect(path)?;
        info!(path = %path.display(), "opened catalog");

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            write_owner: Mutex::new(None),
            observers: Mutex::new(Observers::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =====================================================================
    // Reads
    // =====================================================================

    pub fn query(&self, request: &AssetRequest) -> Result<Results, CatalogError> {
        let assets = query::load_assets(&lock(&self.reader), request)?;
        Ok(Results::new(request.clone(), assets))
    }

    pub fn asset(&self, id: Uuid) -> Result<Option<Asset>, CatalogError> {
        query::load_asset(&lock(&self.reader), id)
    }

    /// Every tag known to the catalog, attached or not, by name.
    pub fn tags(&self) -> Result<Vec<Tag>, CatalogError> {
        let conn = lock(&self.reader);
        let mut stmt = conn.prepare_cached("SELECT name, type FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    name: row.get(0)?,
                    tag_type: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(tags)
    }

    /// Write a consistent copy of the database to `dest`, which must not exist.
    pub fn snapshot_to(&self, dest: &Path) -> Result<(), CatalogError> {
        let conn = lock(&self.writer);
        conn.execute("VACUUM INTO ?1", [dest.to_string_lossy().into_owned()])?;
        info!(dest = %dest.display(), "wrote catalog snapshot");
        Ok(())
    }

    // =====================================================================
    // Transactions
    // =====================================================================

    /// Run `body` with exclusive write access. Commits if it returns `Ok`,
    /// rolls back if it returns `Err`.
    pub fn transaction<T, E>(
        &self,
        body: impl FnOnce(&mut WriteTransaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<CatalogError>,
    {
        let me = thread::current().id();
        if *lock(&self.write_owner) == Some(me) {
            return Err(CatalogError::Transaction.into());
        }

        let mut conn = lock(&self.writer);
        *lock(&self.write_owner) = Some(me);
        let _owner = OwnerGuard(&self.write_owner);

        let value = {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(CatalogError::from)?;
            let mut write = WriteTransaction { tx };
            let value = match body(&mut write) {
                Ok(value) => value,
                Err(e) => {
                    debug!("transaction rolled back");
                    return Err(e);
                }
            };
            write.tx.commit().map_err(CatalogError::from)?;
            value
        };
        debug!("transaction committed");

        self.notify(&conn);
        Ok(value)
    }

    // =====================================================================
    // Observation
    // =====================================================================

    /// Call `on_change` after each commit that changes the results of
    /// `request`, with the diff and the new results.
    pub fn observe(
        &self,
        request: AssetRequest,
        on_change: impl FnMut(&ChangeSet, &[Asset]) + Send + 'static,
    ) -> Result<NotificationToken, CatalogError> {
        let snapshot = self.query(&request)?.into_vec();
        let mut observers = lock(&self.observers);
        let token = NotificationToken(observers.next_token);
        observers.next_token += 1;
        observers.active.push(Observer {
            token,
            request,
            snapshot,
            callback: Box::new(on_change),
        });
        Ok(token)
    }

    /// Unregister an observer. Returns whether `token` was registered.
    pub fn stop_observing(&self, token: NotificationToken) -> bool {
        let mut observers = lock(&self.observers);
        let before = observers.active.len();
        observers.active.retain(|o| o.token != token);
        if observers.active.len() != before {
            return true;
        }
        if observers.notifying.contains(&token) && !observers.cancelled.contains(&token) {
            observers.cancelled.push(token);
            return true;
        }
        false
    }

    /// Re-run every observed request on `conn` and fire callbacks for those
    /// whose results changed. Observers are checked out of the registry while
    /// callbacks run so a callback may observe or stop observing.
    fn notify(&self, conn: &Connection) {
        let mut checked_out = {
            let mut observers = lock(&self.observers);
            if observers.active.is_empty() {
                return;
            }
            let active = std::mem::take(&mut observers.active);
            observers.notifying = active.iter().map(|o| o.token).collect();
            CheckedOut {
                registry: &self.observers,
                observers: active,
            }
        };

        for observer in &mut checked_out.observers {
            let fresh = match query::load_assets(conn, &observer.request) {
                Ok(assets) => assets,
                Err(e) => {
                    warn!(error = %e, "failed to refresh observed query");
                    continue;
                }
            };
            let changes = changes::diff(&observer.snapshot, &fresh, |a| a.identifier);
            observer.snapshot = fresh;
            if !changes.is_empty() {
                (observer.callback)(&changes, &observer.snapshot);
            }
        }
    }

    // =====================================================================
    // Single-purpose writes
    // =====================================================================

    /// Mark `asset` accepted, replacing any rejected status.
    pub fn accept_asset(&self, asset: Uuid) -> Result<(), CatalogError> {
        self.set_status(asset, Tag::accepted())
    }

    /// Mark `asset` rejected, replacing any accepted status.
    pub fn reject_asset(&self, asset: Uuid) -> Result<(), CatalogError> {
        self.set_status(asset, Tag::rejected())
    }

    /// Remove both status tags from `asset`.
    pub fn clear_status(&self, asset: Uuid) -> Result<(), CatalogError> {
        self.transaction(|tx| {
            tx.require_asset(asset)?;
            tx.remove_status_tags(asset)?;
            Ok(())
        })
    }

    fn set_status(&self, asset: Uuid, status: Tag) -> Result<(), CatalogError> {
        self.transaction(|tx| {
            tx.require_asset(asset)?;
            tx.remove_status_tags(asset)?;
            tx.add_tag(asset, &status)
        })
    }

    /// Attach a user tag, creating it if needed. The status tag names
    /// behave like [`accept_asset`](Self::accept_asset) and
    /// [`reject_asset`](Self::reject_asset).
    pub fn tag_asset(&self, asset: Uuid, name: &str) -> Result<(), CatalogError> {
        match name {
            Tag::ACCEPTED => self.accept_asset(asset),
            Tag::REJECTED => self.reject_asset(asset),
            _ => self.transaction(|tx| {
                tx.require_asset(asset)?;
                tx.add_tag(asset, &Tag::user(name))
            }),
        }
    }

    /// Detach a tag by name. Returns whether it was attached.
    pub fn untag_asset(&self, asset: Uuid, name: &str) -> Result<bool, CatalogError> {
        self.transaction(|tx| {
            tx.require_asset(asset)?;
            tx.remove_tag(asset, name)
        })
    }

    pub fn rename_asset(&self, asset: Uuid, name: &str) -> Result<(), CatalogError> {
        self.transaction(|tx| tx.rename_asset(asset, name))
    }

    /// Delete `asset` with its metadata and links. Blobs stay in the store.
    pub fn delete_asset(&self, asset: Uuid) -> Result<(), CatalogError> {
        self.transaction(|tx| tx.delete_asset(asset))
    }
}

/// Write access handed to a [`Catalog::transaction`] body.
pub struct WriteTransaction<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl WriteTransaction<'_> {
    /// Read an asset, including changes made earlier in this transaction.
    pub fn asset(&self, id: Uuid) -> Result<Option<Asset>, CatalogError> {
        query::load_asset(&self.tx, id)
    }

    pub fn require_asset(&self, id: Uuid) -> Result<(), CatalogError> {
        let exists = self
            .tx
            .prepare_cached("SELECT 1 FROM assets WHERE id = ?1")?
            .exists([id.to_string()])?;
        if exists {
            Ok(())
        } else {
            Err(CatalogError::NotFound(id))
        }
    }

    /// Insert `asset` or overwrite the existing record with the same
    /// identifier, together with its metadata, representations and tags.
    pub fn upsert_asset(&self, asset: &Asset) -> Result<(), CatalogError> {
        let key = asset.identifier.to_string();
        self.tx
            .prepare_cached(
                "INSERT INTO assets (id, origin, name, uti) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    origin = excluded.origin, name = excluded.name, uti = excluded.uti",
            )?
            .execute(params![key, asset.origin, asset.name, asset.uti])?;

        match &asset.metadata {
            Some(metadata) => query::store_metadata(&self.tx, &key, metadata)?,
            None => {
                self.tx
                    .execute("DELETE FROM metadata WHERE asset_id = ?1", [&key])?;
            }
        }

        self.tx.execute(
            "DELETE FROM asset_representations WHERE asset_id = ?1",
            [&key],
        )?;
        for (position, rep) in asset.representations.iter().enumerate() {
            self.upsert_representation(rep)?;
            self.tx
                .prepare_cached(
                    "INSERT INTO asset_representations
                     (asset_id, representation_id, type, position) VALUES (?1, ?2, ?3, ?4)",
                )?
                .execute(params![
                    key,
                    rep.identifier,
                    rep.representation_type,
                    position as i64
                ])?;
        }

        self.tx
            .execute("DELETE FROM asset_tags WHERE asset_id = ?1", [&key])?;
        for tag in &asset.tags {
            self.add_tag(asset.identifier, tag)?;
        }
        Ok(())
    }

    /// Register the content identifier of `rep`. Its type is recorded per
    /// asset by [`upsert_asset`](Self::upsert_asset).
    pub fn upsert_representation(&self, rep: &Representation) -> Result<(), CatalogError> {
        self.tx
            .prepare_cached("INSERT OR IGNORE INTO representations (id) VALUES (?1)")?
            .execute([&rep.identifier])?;
        Ok(())
    }

    pub fn upsert_tag(&self, tag: &Tag) -> Result<(), CatalogError> {
        self.tx
            .prepare_cached(
                "INSERT INTO tags (name, type) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET type = excluded.type",
            )?
            .execute(params![tag.name, tag.tag_type])?;
        Ok(())
    }

    /// Upsert `tag` and attach it to `asset`. Attaching twice is a no-op.
    pub fn add_tag(&self, asset: Uuid, tag: &Tag) -> Result<(), CatalogError> {
        self.upsert_tag(tag)?;
        self.tx
            .prepare_cached("INSERT OR IGNORE INTO asset_tags (asset_id, tag_name) VALUES (?1, ?2)")?
            .execute(params![asset.to_string(), tag.name])?;
        Ok(())
    }

    pub fn remove_tag(&self, asset: Uuid, name: &str) -> Result<bool, CatalogError> {
        let removed = self
            .tx
            .prepare_cached("DELETE FROM asset_tags WHERE asset_id = ?1 AND tag_name = ?2")?
            .execute(params![asset.to_string(), name])?;
        Ok(removed > 0)
    }

    /// Detach every accepted or rejected tag from `asset`.
    pub fn remove_status_tags(&self, asset: Uuid) -> Result<usize, CatalogError> {
        let removed = self
            .tx
            .prepare_cached(
                "DELETE FROM asset_tags WHERE asset_id = ?1 AND tag_name IN
                 (SELECT name FROM tags WHERE type IN (?2, ?3))",
            )?
            .execute(params![
                asset.to_string(),
                TagType::Accepted,
                TagType::Rejected
            ])?;
        Ok(removed)
    }

    pub fn rename_asset(&self, asset: Uuid, name: &str) -> Result<(), CatalogError> {
        let updated = self
            .tx
            .prepare_cached("UPDATE assets SET name = ?2 WHERE id = ?1")?
            .execute(params![asset.to_string(), name])?;
        if updated == 0 {
            return Err(CatalogError::NotFound(asset));
        }
        Ok(())
    }

    /// Delete `asset`. Metadata and links cascade; representation rows no
    /// other asset links to are removed too.
    pub fn delete_asset(&self, asset: Uuid) -> Result<(), CatalogError> {
        let deleted = self
            .tx
            .execute("DELETE FROM assets WHERE id = ?1", [asset.to_string()])?;
        if deleted == 0 {
            return Err(CatalogError::NotFound(asset));
        }
        self.tx.execute(
            "DELETE FROM representations WHERE id NOT IN
             (SELECT representation_id FROM asset_representations)",
            [],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{Dimensions, NormalizedHistogram};
    use crate::metadata::{ExifMetadata, Location, Metadata, Orientation, TiffMetadata};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Catalog) {
        let tmp = TempDir::new().unwrap();
        let catalog = Catalog::open(tmp.path().join("database.sqlite")).unwrap();
        (tmp, catalog)
    }

    fn sample_metadata() -> Metadata {
        let mut histogram = NormalizedHistogram::default();
        histogram.luminance[0] = 1.0;
        Metadata {
            dimensions: Dimensions {
                width: 100,
                height: 80,
            },
            orientation: Orientation::Rotated270,
            tiff: Some(TiffMetadata {
                make: Some("Leica".into()),
                ..TiffMetadata::default()
            }),
            exif: Some(ExifMetadata {
                iso: Some(200),
                ..ExifMetadata::default()
            }),
            aux: None,
            location: Some(Location {
                latitude: -33.5,
                longitude: 151.25,
            }),
            histogram,
        }
    }

    fn add(catalog: &Catalog, name: &str) -> Asset {
        let mut asset = Asset::new(AssetOrigin::Files, name, "public.jpeg");
        asset.representations = vec![
            Representation {
                identifier: format!("{name}-original"),
                representation_type: RepresentationType::Original,
            },
            Representation {
                identifier: format!("{name}-thumb"),
                representation_type: RepresentationType::Thumbnail,
            },
        ];
        asset.metadata = Some(sample_metadata());
        catalog
            .transaction(|tx| tx.upsert_asset(&asset))
            .unwrap();
        asset
    }

    fn names(results: &Results) -> Vec<&str> {
        results.iter().map(|a| a.name.as_str()).collect()
    }

    // =========================================================================
    // Open
    // =========================================================================

    #[test]
    fn open_creates_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("database.sqlite");
        Catalog::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn open_garbage_is_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("database.sqlite");
        std::fs::write(&path, b"this is a text file, not sqlite, padded out ............................................................................................").unwrap();
        assert!(matches!(
            Catalog::open(&path),
            Err(CatalogError::InvalidFile { .. })
        ));
    }

    #[test]
    fn open_directory_is_invalid_file() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Catalog::open(tmp.path()),
            Err(CatalogError::InvalidFile { .. })
        ));
    }

    #[test]
    fn records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("database.sqlite");
        let asset = {
            let catalog = Catalog::open(&path).unwrap();
            add(&catalog, "dawn")
        };
        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.asset(asset.identifier).unwrap(), Some(asset));
    }

    // =========================================================================
    // Records
    // =========================================================================

    #[test]
    fn asset_roundtrips_with_everything_attached() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        let loaded = catalog.asset(asset.identifier).unwrap().unwrap();

        assert_eq!(loaded, asset);
        let meta = loaded.metadata.unwrap();
        assert_eq!(meta.orientation, Orientation::Rotated270);
        assert_eq!(meta.location.unwrap().latitude, -33.5);
        assert_eq!(meta.histogram.luminance[0], 1.0);
        assert_eq!(
            loaded.representations[1].representation_type,
            RepresentationType::Thumbnail
        );
    }

    #[test]
    fn missing_asset_is_none() {
        let (_tmp, catalog) = open_temp();
        assert_eq!(catalog.asset(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn shared_representation_row_for_identical_content() {
        let (_tmp, catalog) = open_temp();
        let rep = Representation {
            identifier: "same-hash".into(),
            representation_type: RepresentationType::Original,
        };
        for name in ["a", "b"] {
            let mut asset = Asset::new(AssetOrigin::Files, name, "public.jpeg");
            asset.representations.push(rep.clone());
            catalog.transaction(|tx| tx.upsert_asset(&asset)).unwrap();
        }

        let count: i64 = lock(&catalog.reader)
            .query_row("SELECT COUNT(*) FROM representations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(catalog.query(&AssetRequest::all()).unwrap().len(), 2);
    }

    #[test]
    fn representation_type_is_per_asset() {
        let (_tmp, catalog) = open_temp();
        let a = add(&catalog, "a");
        let mut b = Asset::new(AssetOrigin::Files, "b", "public.jpeg");
        b.representations = vec![
            Representation {
                identifier: "a-thumb".into(),
                representation_type: RepresentationType::Original,
            },
            Representation {
                identifier: "a-thumb".into(),
                representation_type: RepresentationType::Thumbnail,
            },
        ];
        catalog.transaction(|tx| tx.upsert_asset(&b)).unwrap();

        assert_eq!(catalog.asset(a.identifier).unwrap().unwrap(), a);
        assert_eq!(catalog.asset(b.identifier).unwrap().unwrap(), b);
    }

    #[test]
    fn corrupt_orientation_is_reported() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        lock(&catalog.writer)
            .execute("UPDATE metadata SET orientation = 42", [])
            .unwrap();

        assert!(matches!(
            catalog.asset(asset.identifier),
            Err(CatalogError::Corrupt(_))
        ));
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let (_tmp, catalog) = open_temp();
        let mut asset = add(&catalog, "dawn");
        asset.name = "dusk".into();
        asset.metadata = None;
        catalog.transaction(|tx| tx.upsert_asset(&asset)).unwrap();

        let loaded = catalog.asset(asset.identifier).unwrap().unwrap();
        assert_eq!(loaded.name, "dusk");
        assert!(loaded.metadata.is_none());
        assert_eq!(catalog.query(&AssetRequest::all()).unwrap().len(), 1);
    }

    #[test]
    fn delete_cascades_but_keeps_shared_tags() {
        let (_tmp, catalog) = open_temp();
        let a = add(&catalog, "a");
        let b = add(&catalog, "b");
        catalog.accept_asset(a.identifier).unwrap();
        catalog.accept_asset(b.identifier).unwrap();

        catalog.delete_asset(a.identifier).unwrap();

        assert_eq!(catalog.asset(a.identifier).unwrap(), None);
        assert!(catalog.asset(b.identifier).unwrap().unwrap().is_accepted());
        let conn = lock(&catalog.reader);
        let meta_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM metadata", [], |r| r.get(0))
            .unwrap();
        let rep_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM representations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(meta_rows, 1);
        assert_eq!(rep_rows, 2);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (_tmp, catalog) = open_temp();
        assert!(matches!(
            catalog.delete_asset(Uuid::new_v4()),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn rename_changes_sort_position() {
        let (_tmp, catalog) = open_temp();
        let a = add(&catalog, "a");
        add(&catalog, "b");
        catalog.rename_asset(a.identifier, "c").unwrap();

        let all = catalog.query(&AssetRequest::all()).unwrap();
        assert_eq!(names(&all), vec!["b", "c"]);
    }

    // =========================================================================
    // Status tags
    // =========================================================================

    #[test]
    fn accept_then_reject_leaves_only_rejected() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        catalog.accept_asset(asset.identifier).unwrap();
        catalog.reject_asset(asset.identifier).unwrap();

        let tags = catalog.asset(asset.identifier).unwrap().unwrap().tags;
        assert_eq!(tags, vec![Tag::rejected()]);
    }

    #[test]
    fn double_accept_is_idempotent() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        catalog.accept_asset(asset.identifier).unwrap();
        catalog.accept_asset(asset.identifier).unwrap();

        let tags = catalog.asset(asset.identifier).unwrap().unwrap().tags;
        assert_eq!(tags, vec![Tag::accepted()]);
        assert_eq!(catalog.tags().unwrap(), vec![Tag::accepted()]);
    }

    #[test]
    fn status_change_keeps_user_tags() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        catalog.tag_asset(asset.identifier, "portfolio").unwrap();
        catalog.reject_asset(asset.identifier).unwrap();
        catalog.clear_status(asset.identifier).unwrap();

        let loaded = catalog.asset(asset.identifier).unwrap().unwrap();
        assert_eq!(loaded.tags, vec![Tag::user("portfolio")]);
        assert!(!loaded.is_rejected());
    }

    #[test]
    fn tagging_with_status_name_sets_status() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        catalog.accept_asset(asset.identifier).unwrap();
        catalog.tag_asset(asset.identifier, Tag::REJECTED).unwrap();

        let loaded = catalog.asset(asset.identifier).unwrap().unwrap();
        assert_eq!(loaded.tags, vec![Tag::rejected()]);
        assert!(catalog.tags().unwrap().iter().all(|t| t.tag_type.is_status()));
    }

    #[test]
    fn untag_reports_whether_attached() {
        let (_tmp, catalog) = open_temp();
        let asset = add(&catalog, "dawn");
        catalog.tag_asset(asset.identifier, "x").unwrap();
        assert!(catalog.untag_asset(asset.identifier, "x").unwrap());
        assert!(!catalog.untag_asset(asset.identifier, "x").unwrap());
    }

    #[test]
    fn status_on_missing_asset_is_not_found() {
        let (_tmp, catalog) = open_temp();
        assert!(matches!(
            catalog.accept_asset(Uuid::new_v4()),
            Err(CatalogError::NotFound(_))
        ));
        assert!(catalog.tags().unwrap().is_empty());
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn query_by_rejected_tag() {
        let (_tmp, catalog) = open_temp();
        let a = add(&catalog, "a");
        let b = add(&catalog, "b");
        catalog.reject_asset(a.identifier).unwrap();
        catalog.accept_asset(b.identifier).unwrap();

        let rejected = catalog
            .query(&AssetRequest::filtered(Predicate::has_tag(Tag::REJECTED)))
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected.get(0).unwrap().identifier, a.identifier);
    }

    #[test]
    fn query_by_tag_type_and_negation() {
        let (_tmp, catalog) = open_temp();
        let a = add(&catalog, "a");
        add(&catalog, "b");
        catalog.accept_asset(a.identifier).unwrap();

        let accepted = catalog
            .query(&AssetRequest::filtered(Predicate::HasTagType(
                TagType::Accepted,
            )))
            .unwrap();
        assert_eq!(names(&accepted), vec!["a"]);

        let not_accepted = catalog
            .query(&AssetRequest::filtered(
                Predicate::HasTagType(TagType::Accepted).negate(),
            ))
            .unwrap();
        assert_eq!(names(&not_accepted), vec!["b"]);
    }

    #[test]
    fn sort_descending_and_by_origin() {
        let (_tmp, catalog) = open_temp();
        add(&catalog, "a");
        add(&catalog, "c");
        let mut shared = Asset::new(AssetOrigin::ShareExtension, "b", "public.png");
        shared.tags.push(Tag::user("inbox"));
        catalog.transaction(|tx| tx.upsert_asset(&shared)).unwrap();

        let desc = catalog
            .query(&AssetRequest::all().sorted_by(SortKey::Name, false))
            .unwrap();
        assert_eq!(names(&desc), vec!["c", "b", "a"]);

        let by_origin = catalog
            .query(&AssetRequest::all().sorted_by(SortKey::Origin, false))
            .unwrap();
        assert_eq!(by_origin.get(0).unwrap().name, "b");

        let shared_only = catalog
            .query(&AssetRequest::filtered(Predicate::Origin(
                AssetOrigin::ShareExtension,
            )))
            .unwrap();
        assert_eq!(names(&shared_only), vec!["b"]);
    }

    #[test]
    fn name_contains_filter() {
        let (_tmp, catalog) = open_temp();
        add(&catalog, "IMG_0001");
        add(&catalog, "IMG_0002");
        add(&catalog, "DSC_0001");

        let hits = catalog
            .query(&AssetRequest::filtered(Predicate::NameContains(
                "0001".into(),
            )))
            .unwrap();
        assert_eq!(names(&hits), vec!["DSC_0001", "IMG_0001"]);
    }

    #[test]
    fn results_refresh_reports_diff() {
        let (_tmp, catalog) = open_temp();
        add(&catalog, "b");
        let mut results = catalog.query(&AssetRequest::all()).unwrap();
        add(&catalog, "a");

        let changes = results.refresh(&catalog).unwrap();
        assert_eq!(changes.insertions, vec![0]);
        assert_eq!(names(&results), vec!["a", "b"]);
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    #[test]
    fn failed_body_rolls_back() {
        let (_tmp, catalog) = open_temp();
        let asset = Asset::new(AssetOrigin::Files, "ghost", "public.jpeg");
        let result: Result<(), CatalogError> = catalog.transaction(|tx| {
            tx.upsert_asset(&asset)?;
            Err(CatalogError::Corrupt("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(catalog.asset(asset.identifier).unwrap(), None);
    }

    #[test]
    fn nested_transaction_is_refused() {
        let (_tmp, catalog) = open_temp();
        let result: Result<(), CatalogError> =
            catalog.transaction(|_| catalog.transaction(|_| Ok(())));
        assert!(matches!(result, Err(CatalogError::Transaction)));

        // the outer failure released the writer
        catalog.transaction(|_| Ok::<_, CatalogError>(())).unwrap();
    }

    #[test]
    fn reads_see_committed_snapshot_during_write() {
        let (_tmp, catalog) = open_temp();
        let asset = Asset::new(AssetOrigin::Files, "pending", "public.jpeg");
        catalog
            .transaction(|tx| {
                tx.upsert_asset(&asset)?;
                assert!(tx.asset(asset.identifier)?.is_some());
                assert!(catalog.asset(asset.identifier)?.is_none());
                Ok::<_, CatalogError>(())
            })
            .unwrap();
        assert!(catalog.asset(asset.identifier).unwrap().is_some());
    }

    #[test]
    fn concurrent_transactions_serialize() {
        let (_tmp, catalog) = open_temp();
        std::thread::scope(|s| {
            for i in 0..4 {
                let catalog = &catalog;
                s.spawn(move || add(catalog, &format!("asset-{i}")));
            }
        });
        assert_eq!(catalog.query(&AssetRequest::all()).unwrap().len(), 4);
    }

    // =========================================================================
    // Observation
    // =========================================================================

    #[test]
    fn observer_receives_positional_diff() {
        let (_tmp, catalog) = open_temp();
        let b = add(&catalog, "b");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        catalog
            .observe(AssetRequest::all(), move |changes, assets| {
                let names: Vec<String> = assets.iter().map(|a| a.name.clone()).collect();
                sink.lock().unwrap().push((changes.clone(), names));
            })
            .unwrap();

        add(&catalog, "a");
        catalog.accept_asset(b.identifier).unwrap();
        catalog.delete_asset(b.identifier).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].0.insertions, vec![0]);
        assert_eq!(seen[0].1, vec!["a", "b"]);
        assert_eq!(seen[1].0.modifications, vec![1]);
        assert_eq!(seen[2].0.deletions, vec![1]);
    }

    #[test]
    fn observer_not_called_for_unrelated_commit() {
        let (_tmp, catalog) = open_temp();
        let a = add(&catalog, "a");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        catalog
            .observe(
                AssetRequest::filtered(Predicate::has_tag(Tag::REJECTED)),
                move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();

        add(&catalog, "b");
        catalog.accept_asset(a.identifier).unwrap();
        catalog.accept_asset(a.identifier).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        catalog.reject_asset(a.identifier).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_observing_silences_callback() {
        let (_tmp, catalog) = open_temp();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let token = catalog
            .observe(AssetRequest::all(), move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        add(&catalog, "a");
        assert!(catalog.stop_observing(token));
        add(&catalog, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_observing_unknown_token_is_false() {
        let (_tmp, catalog) = open_temp();
        let token = catalog.observe(AssetRequest::all(), |_, _| {}).unwrap();
        assert!(catalog.stop_observing(token));
        assert!(!catalog.stop_observing(token));
        assert!(!catalog.stop_observing(NotificationToken(99)));
        assert!(lock(&catalog.observers).cancelled.is_empty());
    }

    #[test]
    fn callback_may_stop_its_own_observation() {
        let (_tmp, catalog) = open_temp();
        let catalog = Arc::new(catalog);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let own = Arc::new(Mutex::new(None));
        let own_token = Arc::clone(&own);
        let weak = Arc::downgrade(&catalog);
        let token = catalog
            .observe(AssetRequest::all(), move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                let token = own_token.lock().unwrap().take();
                if let (Some(catalog), Some(token)) = (weak.upgrade(), token) {
                    assert!(catalog.stop_observing(token));
                }
            })
            .unwrap();
        *own.lock().unwrap() = Some(token);

        add(&catalog, "a");
        add(&catalog, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lock(&catalog.observers).active.is_empty());
    }

    #[test]
    fn panicking_callback_keeps_other_observers() {
        let (_tmp, catalog) = open_temp();
        let panicked = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&panicked);
        catalog
            .observe(AssetRequest::all(), move |_, _| {
                if flag.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("observer failure");
                }
            })
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        catalog
            .observe(AssetRequest::all(), move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let first = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| add(&catalog, "a")));
        assert!(first.is_err());
        assert_eq!(catalog.query(&AssetRequest::all()).unwrap().len(), 1);

        add(&catalog, "b");
        assert_eq!(panicked.load(Ordering::SeqCst), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&catalog.observers).active.len(), 2);
    }

    #[test]
    fn rolled_back_transaction_does_not_notify() {
        let (_tmp, catalog) = open_temp();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        catalog
            .observe(AssetRequest::all(), move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let asset = Asset::new(AssetOrigin::Files, "ghost", "public.jpeg");
        let _ = catalog.transaction(|tx| {
            tx.upsert_asset(&asset)?;
            Err::<(), _>(CatalogError::Transaction)
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
