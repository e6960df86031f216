//! Project document: one directory holding a catalog and its blobs.
//!
//! ```text
//! Shoot/
//! ├── project.identifier   # UUID, stable across opens
//! ├── database.sqlite      # catalog
//! ├── images/              # content store, files named by SHA-256
//! └── config.toml          # optional
//! ```
//!
//! A [`Project`] is the session object: it owns the catalog, the
//! representation cache (and through it the content store), the selection
//! notifier and the loaded config, and tears them down together on drop.

use crate::cache::{RepresentationCache, RepresentationData};
use crate::catalog::{Asset, AssetRequest, Catalog, CatalogError, Predicate, RepresentationType};
use crate::config::{self, CONFIG_FILENAME, ConfigError, ProjectConfig};
use crate::imaging::ImageBackend;
use crate::import::AssetImporter;
use crate::selection::SelectionNotifier;
use crate::store::ContentStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const IDENTIFIER_FILENAME: &str = "project.identifier";
pub const DATABASE_FILENAME: &str = "database.sqlite";
pub const IMAGES_DIRNAME: &str = "images";

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Invalid project at {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

fn invalid(path: &Path, reason: impl Into<String>) -> ProjectError {
    ProjectError::InvalidFile {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub struct Project {
    root: PathBuf,
    identifier: Uuid,
    config: ProjectConfig,
    catalog: Catalog,
    cache: RepresentationCache,
    selection: SelectionNotifier,
}

impl Project {
    /// Create a new project at `root`, which may exist but must not already
    /// be a project.
    pub fn create(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref();
        if root.join(IDENTIFIER_FILENAME).exists() {
            return Err(invalid(root, "already a project"));
        }
        let mut scaffold = Scaffold::new(root);
        fs::create_dir_all(scaffold.claim(IMAGES_DIRNAME))?;
        let identifier = Uuid::new_v4();
        fs::write(scaffold.claim(IDENTIFIER_FILENAME), identifier.to_string())?;
        scaffold.claim_database();
        let project = Self::load(root, identifier)?;
        scaffold.keep();
        info!(root = %root.display(), %identifier, "created project");
        Ok(project)
    }

    /// Open an existing project.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref();
        let identifier = read_identifier(root)?;
        if !root.join(DATABASE_FILENAME).is_file() {
            return Err(invalid(root, format!("missing {DATABASE_FILENAME}")));
        }
        Self::load(root, identifier)
    }

    fn load(root: &Path, identifier: Uuid) -> Result<Self, ProjectError> {
        let config = config::load_config(root)?;
        let catalog = Catalog::open(root.join(DATABASE_FILENAME))?;
        let store = ContentStore::new(root.join(IMAGES_DIRNAME));
        Ok(Self {
            root: root.to_path_buf(),
            identifier,
            cache: RepresentationCache::new(store, config.cache.enabled),
            config,
            catalog,
            selection: SelectionNotifier::new(),
        })
    }

    /// Copy this project to `dest` and open the copy. The copy keeps the
    /// same identifier.
    pub fn save_as(&self, dest: impl AsRef<Path>) -> Result<Project, ProjectError> {
        let dest = dest.as_ref();
        if dest.join(IDENTIFIER_FILENAME).exists() || dest.join(DATABASE_FILENAME).exists() {
            return Err(invalid(dest, "destination already holds a project"));
        }
        let mut scaffold = Scaffold::new(dest);
        let images = scaffold.claim(IMAGES_DIRNAME);
        fs::create_dir_all(&images)?;

        scaffold.claim_database();
        self.catalog.snapshot_to(&dest.join(DATABASE_FILENAME))?;
        let mut copied = 0;
        if self.store().root().is_dir() {
            for entry in fs::read_dir(self.store().root())? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    fs::copy(entry.path(), images.join(entry.file_name()))?;
                    copied += 1;
                }
            }
        }
        let config_path = self.root.join(CONFIG_FILENAME);
        if config_path.is_file() {
            fs::copy(&config_path, scaffold.claim(CONFIG_FILENAME))?;
        }
        fs::write(
            scaffold.claim(IDENTIFIER_FILENAME),
            self.identifier.to_string(),
        )?;

        let copy = Project::open(dest)?;
        scaffold.keep();
        info!(dest = %dest.display(), blobs = copied, "saved project copy");
        Ok(copy)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn identifier(&self) -> Uuid {
        self.identifier
    }

    /// Display title: the project directory's name without extension.
    pub fn title(&self) -> String {
        self.root
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &RepresentationCache {
        &self.cache
    }

    pub fn store(&self) -> &ContentStore {
        self.cache.store()
    }

    pub fn selection(&self) -> &SelectionNotifier {
        &self.selection
    }

    /// An importer writing into this project with its configured thumbnail
    /// settings.
    pub fn importer<'a, B: ImageBackend>(&'a self, backend: &'a B) -> AssetImporter<'a, B> {
        AssetImporter::new(
            backend,
            self.store(),
            &self.catalog,
            self.config.thumbnail_params(),
        )
    }

    /// Load `asset`'s representation of the given type through the cache.
    ///
    /// `None` when the asset has no such representation or its blob is
    /// missing from the store.
    pub fn load_representation(
        &self,
        asset: &Asset,
        representation_type: RepresentationType,
    ) -> Option<Arc<RepresentationData>> {
        let rep = asset.representation(representation_type)?;
        self.cache.load(&rep.identifier)
    }

    /// Assets matching `key`, which is either an asset UUID or an exact name.
    pub fn find_assets(&self, key: &str) -> Result<Vec<Asset>, CatalogError> {
        if let Ok(id) = Uuid::parse_str(key) {
            if let Some(asset) = self.catalog.asset(id)? {
                return Ok(vec![asset]);
            }
        }
        let request = AssetRequest::filtered(Predicate::NameEquals(key.to_string()));
        Ok(self.catalog.query(&request)?.into_vec())
    }
}

/// Paths put down while laying out a project directory. Dropped without
/// [`keep`](Self::keep), it removes them again: the whole root if it did not
/// exist before, otherwise only the entries it claimed.
struct Scaffold {
    root: PathBuf,
    created_root: bool,
    created: Vec<PathBuf>,
    keep: bool,
}

impl Scaffold {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            created_root: !root.exists(),
            created: Vec::new(),
            keep: false,
        }
    }

    /// Path of `name` under the root, recorded for removal unless it
    /// already exists. Call before creating it.
    fn claim(&mut self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if !path.exists() {
            self.created.push(path.clone());
        }
        path
    }

    /// The catalog file and its WAL companions.
    fn claim_database(&mut self) {
        self.claim(DATABASE_FILENAME);
        self.claim(&format!("{DATABASE_FILENAME}-wal"));
        self.claim(&format!("{DATABASE_FILENAME}-shm"));
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for Scaffold {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        let removed = if self.created_root {
            remove_path(&self.root)
        } else {
            self.created.iter().rev().try_for_each(|path| remove_path(path))
        };
        match removed {
            Ok(()) => info!(root = %self.root.display(), "removed partial project"),
            Err(e) => warn!(root = %self.root.display(), error = %e, "failed to remove partial project"),
        }
    }
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn read_identifier(root: &Path) -> Result<Uuid, ProjectError> {
    let path = root.join(IDENTIFIER_FILENAME);
    let raw = fs::read_to_string(&path)
        .map_err(|e| invalid(root, format!("cannot read {IDENTIFIER_FILENAME}: {e}")))?;
    Uuid::parse_str(raw.trim())
        .map_err(|e| invalid(root, format!("bad {IDENTIFIER_FILENAME}: {e}")))
}
