//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every asset is shown by its semantic identity first (positional index and
//! name, plus its status), with identifiers and hashes as indented context
//! lines underneath. Names are what people recognise; UUIDs are there so the
//! output can be pasted back into another command.
//!
//! # Output Format
//!
//! ## List
//!
//! ```text
//! 001 dawn [accepted]
//!     Id: 5d1c0a4e-…
//! 002 dusk
//!     Id: 9b3f77c2-…
//! 2 assets
//! ```
//!
//! ## Import
//!
//! ```text
//! 001 dawn
//!     Source: trip/dawn.jpg
//! 002 (notes.jpg) failed
//!     Error: Not a decodable image: …
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::catalog::{Asset, RepresentationType, TagType};
use crate::import::{ImportEvent, ImportReport};
use crate::metadata::{ExifMetadata, Metadata, TiffMetadata};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

const INDENT: &str = "    ";

/// `001 dawn [accepted]`
fn asset_header(position: usize, asset: &Asset) -> String {
    match status_label(asset) {
        Some(status) => format!("{:03} {} [{}]", position, asset.name, status),
        None => format!("{:03} {}", position, asset.name),
    }
}

fn status_label(asset: &Asset) -> Option<&'static str> {
    if asset.is_accepted() {
        Some("accepted")
    } else if asset.is_rejected() {
        Some("rejected")
    } else {
        None
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Asset list
// ============================================================================

pub fn format_asset_list(assets: &[Asset]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, asset) in assets.iter().enumerate() {
        lines.push(asset_header(i + 1, asset));
        lines.push(format!("{INDENT}Id: {}", asset.identifier));
    }
    lines.push(plural(assets.len(), "asset"));
    lines
}

pub fn print_asset_list(assets: &[Asset]) {
    for line in format_asset_list(assets) {
        println!("{}", line);
    }
}

// ============================================================================
// Asset details
// ============================================================================

/// Everything known about one asset, metadata included.
pub fn format_asset_details(asset: &Asset) -> Vec<String> {
    let mut lines = vec![asset.name.clone()];
    let mut field = |label: &str, value: String| lines.push(format!("{INDENT}{label}: {value}"));

    field("Id", asset.identifier.to_string());
    field("Origin", asset.origin.to_string());
    field("Type", asset.uti.clone());
    field("Status", status_label(asset).unwrap_or("none").to_string());
    let user_tags: Vec<&str> = asset
        .tags
        .iter()
        .filter(|t| t.tag_type == TagType::UserCreated)
        .map(|t| t.name.as_str())
        .collect();
    if !user_tags.is_empty() {
        field("Tags", user_tags.join(", "));
    }
    for kind in [RepresentationType::Original, RepresentationType::Thumbnail] {
        if let Some(rep) = asset.representation(kind) {
            let label = match kind {
                RepresentationType::Original => "Original",
                RepresentationType::Thumbnail => "Thumbnail",
            };
            field(label, rep.identifier.clone());
        }
    }

    if let Some(meta) = &asset.metadata {
        lines.extend(format_metadata(meta));
    }
    lines
}

fn format_metadata(meta: &Metadata) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{INDENT}Dimensions: {}\u{00d7}{}",
            meta.dimensions.width, meta.dimensions.height
        ),
        format!("{INDENT}Orientation: {}", meta.orientation.exif_value()),
    ];
    if let Some(tiff) = &meta.tiff {
        lines.extend(format_tiff(tiff));
    }
    if let Some(lens) = meta.aux.as_ref().and_then(|a| a.lens_model.as_deref()) {
        lines.push(format!("{INDENT}Lens: {lens}"));
    }
    if let Some(exif) = &meta.exif {
        lines.extend(format_exif(exif));
    }
    if let Some(loc) = meta.location {
        lines.push(format!(
            "{INDENT}Location: {:.5}, {:.5}",
            loc.latitude, loc.longitude
        ));
    }
    lines
}

fn format_tiff(tiff: &TiffMetadata) -> Option<String> {
    let camera: Vec<&str> = [tiff.make.as_deref(), tiff.model.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    (!camera.is_empty()).then(|| format!("{INDENT}Camera: {}", camera.join(" ")))
}

fn format_exif(exif: &ExifMetadata) -> Vec<String> {
    let mut lines = Vec::new();
    let mut exposure = Vec::new();
    if let Some(t) = exif.exposure_time {
        exposure.push(format_exposure_time(t));
    }
    if let Some(f) = exif.f_number {
        exposure.push(format!("f/{f:.1}"));
    }
    if let Some(iso) = exif.iso {
        exposure.push(format!("ISO {iso}"));
    }
    if let Some(mm) = exif.focal_length {
        exposure.push(format!("{mm:.0}mm"));
    }
    if !exposure.is_empty() {
        lines.push(format!("{INDENT}Exposure: {}", exposure.join(" ")));
    }
    if let Some(when) = exif.capture_time {
        lines.push(format!("{INDENT}Captured: {}", when.format("%Y-%m-%d %H:%M:%S")));
    }
    lines
}

/// `1/125s` below a second, `2s` or `2.5s` above.
fn format_exposure_time(seconds: f64) -> String {
    if seconds > 0.0 && seconds < 1.0 {
        format!("1/{:.0}s", 1.0 / seconds)
    } else if seconds.fract() == 0.0 {
        format!("{seconds:.0}s")
    } else {
        format!("{seconds:.1}s")
    }
}

pub fn print_asset_details(asset: &Asset) {
    for line in format_asset_details(asset) {
        println!("{}", line);
    }
}

// ============================================================================
// Import
// ============================================================================

/// Format a single import progress event as display lines.
pub fn format_import_event(event: &ImportEvent) -> Vec<String> {
    match event {
        ImportEvent::Imported {
            index, path, name, ..
        } => vec![
            format!("{:03} {}", index + 1, name),
            format!("{INDENT}Source: {}", path.display()),
        ],
        ImportEvent::Failed { index, path, error } => vec![
            format!("{:03} ({}) failed", index + 1, file_name(path)),
            format!("{INDENT}Error: {}", error),
        ],
    }
}

pub fn format_import_report(report: &ImportReport) -> Vec<String> {
    let mut lines = vec![format!("Import: {}", report)];
    for (path, error) in &report.failed {
        lines.push(format!("{INDENT}{}: {}", path.display(), error));
    }
    lines
}

pub fn print_import_report(report: &ImportReport) {
    for line in format_import_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssetOrigin, Representation, Tag};
    use crate::imaging::{Dimensions, NormalizedHistogram};
    use crate::import::ImportError;
    use crate::metadata::{ExifAuxMetadata, Location, Orientation};
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn asset(name: &str) -> Asset {
        Asset::new(AssetOrigin::Files, name, "public.jpeg")
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn header_with_and_without_status() {
        let mut a = asset("dawn");
        assert_eq!(asset_header(1, &a), "001 dawn");
        a.tags.push(Tag::rejected());
        assert_eq!(asset_header(12, &a), "012 dawn [rejected]");
    }

    #[test]
    fn exposure_time_formatting() {
        assert_eq!(format_exposure_time(0.008), "1/125s");
        assert_eq!(format_exposure_time(2.0), "2s");
        assert_eq!(format_exposure_time(2.5), "2.5s");
    }

    // =========================================================================
    // List
    // =========================================================================

    #[test]
    fn list_shows_ids_and_count() {
        let mut a = asset("dawn");
        a.tags.push(Tag::accepted());
        let b = asset("dusk");
        let lines = format_asset_list(&[a.clone(), b.clone()]);

        assert_eq!(
            lines,
            vec![
                "001 dawn [accepted]".to_string(),
                format!("    Id: {}", a.identifier),
                "002 dusk".to_string(),
                format!("    Id: {}", b.identifier),
                "2 assets".to_string(),
            ]
        );
    }

    #[test]
    fn empty_list() {
        assert_eq!(format_asset_list(&[]), vec!["0 assets"]);
        assert_eq!(format_asset_list(&[asset("a")]).last().unwrap(), "1 asset");
    }

    // =========================================================================
    // Details
    // =========================================================================

    #[test]
    fn details_without_metadata() {
        let mut a = asset("dawn");
        a.tags = vec![Tag::user("portfolio"), Tag::user("travel")];
        a.representations.push(Representation {
            identifier: "abc123".into(),
            representation_type: RepresentationType::Original,
        });
        let lines = format_asset_details(&a);

        assert_eq!(lines[0], "dawn");
        assert!(lines.contains(&"    Origin: files".to_string()));
        assert!(lines.contains(&"    Type: public.jpeg".to_string()));
        assert!(lines.contains(&"    Status: none".to_string()));
        assert!(lines.contains(&"    Tags: portfolio, travel".to_string()));
        assert!(lines.contains(&"    Original: abc123".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Thumbnail")));
    }

    #[test]
    fn details_with_full_metadata() {
        let mut a = asset("dawn");
        a.metadata = Some(Metadata {
            dimensions: Dimensions {
                width: 6000,
                height: 4000,
            },
            orientation: Orientation::Rotated90,
            tiff: Some(TiffMetadata {
                make: Some("Leica".into()),
                model: Some("M10".into()),
                ..TiffMetadata::default()
            }),
            exif: Some(ExifMetadata {
                exposure_time: Some(0.004),
                f_number: Some(2.8),
                iso: Some(200),
                focal_length: Some(35.0),
                capture_time: NaiveDate::from_ymd_opt(2024, 5, 1)
                    .and_then(|d| d.and_hms_opt(6, 30, 0)),
                ..ExifMetadata::default()
            }),
            aux: Some(ExifAuxMetadata {
                lens_model: Some("Summicron 35".into()),
                ..ExifAuxMetadata::default()
            }),
            location: Some(Location {
                latitude: 48.8584,
                longitude: -2.2945,
            }),
            histogram: NormalizedHistogram::default(),
        });
        let lines = format_asset_details(&a);

        assert!(lines.contains(&"    Dimensions: 6000\u{00d7}4000".to_string()));
        assert!(lines.contains(&"    Orientation: 6".to_string()));
        assert!(lines.contains(&"    Camera: Leica M10".to_string()));
        assert!(lines.contains(&"    Lens: Summicron 35".to_string()));
        assert!(lines.contains(&"    Exposure: 1/250s f/2.8 ISO 200 35mm".to_string()));
        assert!(lines.contains(&"    Captured: 2024-05-01 06:30:00".to_string()));
        assert!(lines.contains(&"    Location: 48.85840, -2.29450".to_string()));
    }

    // =========================================================================
    // Import
    // =========================================================================

    #[test]
    fn import_event_lines() {
        let ok = ImportEvent::Imported {
            index: 0,
            path: PathBuf::from("trip/dawn.jpg"),
            asset: Uuid::new_v4(),
            name: "dawn".into(),
        };
        assert_eq!(
            format_import_event(&ok),
            vec!["001 dawn", "    Source: trip/dawn.jpg"]
        );

        let failed = ImportEvent::Failed {
            index: 1,
            path: PathBuf::from("trip/notes.jpg"),
            error: "boom".into(),
        };
        assert_eq!(
            format_import_event(&failed),
            vec!["002 (notes.jpg) failed", "    Error: boom"]
        );
    }

    #[test]
    fn import_report_lists_failures() {
        let report = ImportReport {
            imported: vec![asset("a")],
            failed: vec![(PathBuf::from("b.jpg"), ImportError::Cancelled)],
            cancelled: 0,
        };
        assert_eq!(
            format_import_report(&report),
            vec!["Import: 1 imported, 1 failed", "    b.jpg: Import cancelled"]
        );
    }
}
