//! Asset import: one source file in, one cataloged asset out.
//!
//! ## Per-file pipeline
//!
//! ```text
//! read bytes → decode → read properties → thumbnail → hash both
//!            → histogram → [ transaction: upsert asset, write blobs ]
//! ```
//!
//! Everything before the transaction is pure computation: a file that fails
//! to decode or thumbnail leaves neither the catalog nor the content store
//! touched. Blobs are written from inside the transaction body, so a failed
//! blob write rolls the catalog records back instead of committing a
//! representation that resolves to nothing. A blob written before a later
//! failure stays on disk as an orphan, which is harmless: it is addressed by
//! its own content and will be reused by the next import of the same bytes.
//!
//! ## Batches
//!
//! [`AssetImporter::import_batch`] runs files in parallel on the rayon pool.
//! Each file's outcome is independent; one bad file never aborts the rest.
//! Progress is reported over an optional `mpsc` channel as files finish.
//!
//! ## Cancellation
//!
//! A [`CancellationToken`] is checked before each file starts and again
//! right before its transaction. A file past that second check runs to
//! completion.

use crate::catalog::{
    Asset, AssetOrigin, Catalog, CatalogError, Representation, RepresentationType,
};
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, NormalizedHistogram, ThumbnailParams,
    supported_input_extensions,
};
use crate::metadata::{ImageProperties, Metadata};
use crate::store::{ContentStore, StoreError, sha256_hex};
use image::{GenericImageView, ImageFormat};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not a decodable image: {0}")]
    Decode(BackendError),
    #[error("Thumbnail generation failed: {0}")]
    Thumbnail(BackendError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Import cancelled")]
    Cancelled,
}

/// Shared flag that asks in-flight imports to stop before committing.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress event emitted by [`AssetImporter::import_batch`].
#[derive(Debug, Clone)]
pub enum ImportEvent {
    Imported {
        index: usize,
        path: PathBuf,
        asset: Uuid,
        name: String,
    },
    Failed {
        index: usize,
        path: PathBuf,
        error: String,
    },
}

/// Outcome of a batch, in input order within each list.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Asset>,
    pub failed: Vec<(PathBuf, ImportError)>,
    pub cancelled: usize,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} failed",
            self.imported.len(),
            self.failed.len()
        )?;
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

/// Imports files into a catalog and content store using `backend` for
/// decoding, metadata and thumbnails.
pub struct AssetImporter<'a, B: ImageBackend> {
    backend: &'a B,
    store: &'a ContentStore,
    catalog: &'a Catalog,
    params: ThumbnailParams,
    cancel: CancellationToken,
}

impl<'a, B: ImageBackend> AssetImporter<'a, B> {
    pub fn new(
        backend: &'a B,
        store: &'a ContentStore,
        catalog: &'a Catalog,
        params: ThumbnailParams,
    ) -> Self {
        Self {
            backend,
            store,
            catalog,
            params,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Import the file at `path`. The asset is named after the file stem.
    pub fn import_file(&self, path: &Path, origin: AssetOrigin) -> Result<Asset, ImportError> {
        self.check_cancelled()?;
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let uti = uti_for(path, &bytes);
        let asset = self.import_bytes(&name, &uti, origin, &bytes)?;
        info!(path = %path.display(), asset = %asset.identifier, "imported");
        Ok(asset)
    }

    /// Import in-memory image bytes as a new asset.
    pub fn import_bytes(
        &self,
        name: &str,
        uti: &str,
        origin: AssetOrigin,
        bytes: &[u8],
    ) -> Result<Asset, ImportError> {
        self.check_cancelled()?;

        let image = self.backend.decode(bytes).map_err(ImportError::Decode)?;
        let properties = match self.backend.read_properties(bytes) {
            Ok(properties) => properties,
            Err(e) => {
                warn!(name, error = %e, "metadata unreadable, using decoded dimensions");
                let (width, height) = image.dimensions();
                ImageProperties {
                    dimensions: Dimensions { width, height },
                    ..ImageProperties::default()
                }
            }
        };
        let thumbnail = self
            .backend
            .thumbnail(&image, properties.orientation, &self.params)
            .map_err(ImportError::Thumbnail)?;

        let original_id = sha256_hex(bytes);
        let thumbnail_id = sha256_hex(&thumbnail);
        let histogram = NormalizedHistogram::compute(&image);
        drop(image);

        let mut asset = Asset::new(origin, name, uti);
        asset.metadata = Some(Metadata::new(properties, histogram));
        asset.representations = vec![
            Representation {
                identifier: original_id.clone(),
                representation_type: RepresentationType::Original,
            },
            Representation {
                identifier: thumbnail_id.clone(),
                representation_type: RepresentationType::Thumbnail,
            },
        ];

        self.check_cancelled()?;
        self.catalog.transaction(|tx| {
            tx.upsert_asset(&asset)?;
            self.write_blob(bytes, &original_id)?;
            self.write_blob(&thumbnail, &thumbnail_id)?;
            Ok::<_, ImportError>(())
        })?;

        debug!(
            asset = %asset.identifier,
            original = %original_id,
            thumbnail = %thumbnail_id,
            "committed import"
        );
        Ok(asset)
    }

    /// Import every path in parallel. Events are sent as each file finishes.
    pub fn import_batch(
        &self,
        paths: &[PathBuf],
        origin: AssetOrigin,
        events: Option<Sender<ImportEvent>>,
    ) -> ImportReport {
        let outcomes: Vec<(PathBuf, Result<Asset, ImportError>)> = paths
            .par_iter()
            .enumerate()
            .map_with(events, |events, (index, path)| {
                let result = self.import_file(path, origin);
                match &result {
                    Ok(asset) => emit(
                        events,
                        ImportEvent::Imported {
                            index,
                            path: path.clone(),
                            asset: asset.identifier,
                            name: asset.name.clone(),
                        },
                    ),
                    Err(ImportError::Cancelled) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "import failed");
                        emit(
                            events,
                            ImportEvent::Failed {
                                index,
                                path: path.clone(),
                                error: e.to_string(),
                            },
                        );
                    }
                }
                (path.clone(), result)
            })
            .collect();

        let mut report = ImportReport::default();
        for (path, result) in outcomes {
            match result {
                Ok(asset) => report.imported.push(asset),
                Err(ImportError::Cancelled) => report.cancelled += 1,
                Err(e) => report.failed.push((path, e)),
            }
        }
        info!(%report, "batch import finished");
        report
    }

    fn write_blob(&self, bytes: &[u8], identifier: &str) -> Result<(), StoreError> {
        if self.store.contains(identifier) {
            debug!(identifier, "blob already stored");
            return Ok(());
        }
        self.store.store(bytes, identifier)
    }

    fn check_cancelled(&self) -> Result<(), ImportError> {
        if self.cancel.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn emit(events: &Option<Sender<ImportEvent>>, event: ImportEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

/// Uniform type identifier for a source file: by extension, then by
/// sniffing the bytes, then the generic `public.image`.
pub fn uti_for(path: &Path, bytes: &[u8]) -> String {
    path.extension()
        .and_then(|ext| uti_for_extension(&ext.to_string_lossy()))
        .or_else(|| {
            image::guess_format(bytes)
                .ok()
                .and_then(uti_for_format)
        })
        .unwrap_or("public.image")
        .to_string()
}

fn uti_for_extension(ext: &str) -> Option<&'static str> {
    let uti = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => "public.jpeg",
        "png" => "public.png",
        "tif" | "tiff" => "public.tiff",
        "heic" => "public.heic",
        "heif" => "public.heif",
        "webp" => "org.webmproject.webp",
        "gif" => "com.compuserve.gif",
        "bmp" => "com.microsoft.bmp",
        "dng" => "com.adobe.raw-image",
        _ => return None,
    };
    Some(uti)
}

fn uti_for_format(format: ImageFormat) -> Option<&'static str> {
    let uti = match format {
        ImageFormat::Jpeg => "public.jpeg",
        ImageFormat::Png => "public.png",
        ImageFormat::Tiff => "public.tiff",
        ImageFormat::WebP => "org.webmproject.webp",
        ImageFormat::Gif => "com.compuserve.gif",
        ImageFormat::Bmp => "com.microsoft.bmp",
        _ => return None,
    };
    Some(uti)
}

/// Expand `inputs` into the list of files to import. Directories are
/// walked recursively and filtered to supported extensions; explicit file
/// arguments are kept as given. Output is sorted and deduplicated.
///
/// Entries the walk cannot read, such as dangling links or unreadable
/// subdirectories, are logged and skipped.
pub fn collect_sources(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(input).display().to_string();
                    warn!(path, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| supported_input_extensions().iter().any(|e| *e == ext))
}
