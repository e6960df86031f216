//! # Photoflow
//!
//! A content-addressed photo catalog. Images are imported into a project
//! directory, stored once by SHA-256, thumbnailed, and cataloged with their
//! camera metadata and a histogram. Assets can then be accepted, rejected,
//! tagged, queried and observed for changes.
//!
//! # Architecture: Blob Store + Catalog
//!
//! ```text
//! source file ──► import ──► store    images/<sha256>      (durable bytes)
//!                        └─► catalog  database.sqlite      (assets, tags, metadata)
//!
//! catalog query ──► representation id ──► cache ──► store
//! ```
//!
//! The store knows nothing about assets; the catalog knows blobs only by
//! their hash. The import pipeline is the one place that writes both, and it
//! does so inside a single catalog transaction.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`] | Content-addressed blob storage on a directory, plus the SHA-256 helper |
//! | [`cache`] | Weakly-held cache of loaded representations, shared while callers hold them |
//! | [`catalog`] | SQLite-backed records, queries, transactions and change observation |
//! | [`imaging`] | Decoding, thumbnails, EXIF reading and histograms behind the `ImageBackend` trait |
//! | [`metadata`] | Typed metadata records attached to assets |
//! | [`import`] | Per-file and batch import, cancellation |
//! | [`project`] | Project directory layout; the session object owning everything above |
//! | [`selection`] | Current selection and its subscribers |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content Addressing
//!
//! A blob's name is the hex SHA-256 of its bytes. Importing the same file
//! twice creates two assets but stores one original and one thumbnail: the
//! catalog deduplicates nothing, the store deduplicates everything. Blobs are
//! never deleted; an asset deletion leaves its blobs behind.
//!
//! ## Weak Cache
//!
//! The [`cache`] never keeps data alive on its own. It indexes `Weak`
//! handles to data callers are holding, so memory use tracks what is
//! actually in use without an eviction policy.
//!
//! ## SQLite in WAL Mode
//!
//! The catalog keeps a writer and a reader connection. Queries see the last
//! committed state even while a transaction is open, and observers are
//! notified with positional diffs after every commit.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, JPEG
//! encoding) and `kamadak-exif`. No system libraries are needed, and the
//! `ImageBackend` trait keeps the pipeline testable with a mock.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod imaging;
pub mod import;
pub mod metadata;
pub mod output;
pub mod project;
pub mod selection;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
