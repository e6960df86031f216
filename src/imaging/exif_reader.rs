//! EXIF extraction on top of `kamadak-exif`.
//!
//! [`ExifReader`] wraps a parsed [`exif::Exif`] and hands back plain Rust
//! values per tag. Only the primary image directory is consulted; the
//! embedded thumbnail directory is ignored.
//!
//! A source without EXIF (PNG screenshots, stripped JPEGs) is the common
//! case, not an error: [`ExifReader::from_slice`] returns `None` and the
//! caller keeps default properties.

use crate::metadata::{
    ColorSpace, ExifAuxMetadata, ExifMetadata, ExposureProgram, ImageProperties, Location,
    Orientation, TiffMetadata,
};
use chrono::NaiveDateTime;
use exif::{In, Tag, Value};
use std::io::Cursor;
use tracing::{debug, warn};

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

pub struct ExifReader(exif::Exif);

impl ExifReader {
    /// Parse EXIF from a complete image file held in memory.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(parsed) => Some(Self(parsed)),
            Err(
                exif::Error::NotFound(_) | exif::Error::NotSupported(_) | exif::Error::BlankValue(_),
            ) => None,
            Err(e) => {
                warn!(error = %e, "unreadable EXIF block, ignoring");
                None
            }
        }
    }

    fn value(&self, tag: Tag) -> Option<&Value> {
        self.0.get_field(tag, In::PRIMARY).map(|f| &f.value)
    }

    /// First ASCII component with trailing NULs and whitespace stripped.
    pub fn ascii(&self, tag: Tag) -> Option<String> {
        match self.value(tag)? {
            Value::Ascii(parts) => parts
                .first()
                .map(|raw| String::from_utf8_lossy(raw).trim_end_matches(['\0', ' ']).to_string())
                .filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    pub fn uint(&self, tag: Tag) -> Option<u32> {
        self.value(tag)?.get_uint(0)
    }

    /// Numeric value of a rational, signed rational or integer tag.
    pub fn real(&self, tag: Tag) -> Option<f64> {
        let value = match self.value(tag)? {
            Value::Rational(v) => v.first().map(|r| r.to_f64()),
            Value::SRational(v) => v.first().map(|r| r.to_f64()),
            other => other.get_uint(0).map(f64::from),
        };
        value.filter(|v| v.is_finite())
    }

    pub fn datetime(&self, tag: Tag) -> Option<NaiveDateTime> {
        parse_exif_datetime(&self.ascii(tag)?)
    }

    pub fn orientation(&self) -> Option<Orientation> {
        Orientation::from_exif(self.uint(Tag::Orientation)?)
    }

    pub fn tiff(&self) -> Option<TiffMetadata> {
        let tiff = TiffMetadata {
            copyright: self.ascii(Tag::Copyright),
            make: self.ascii(Tag::Make),
            model: self.ascii(Tag::Model),
            firmware_version: self.ascii(Tag::Software),
        };
        (tiff != TiffMetadata::default()).then_some(tiff)
    }

    pub fn exif(&self) -> Option<ExifMetadata> {
        let exif = ExifMetadata {
            capture_time: self.datetime(Tag::DateTimeOriginal),
            digitization_time: self.datetime(Tag::DateTimeDigitized),
            color_space: self.uint(Tag::ColorSpace).and_then(ColorSpace::from_exif),
            exposure_bias: self.real(Tag::ExposureBiasValue),
            exposure_program: self
                .uint(Tag::ExposureProgram)
                .and_then(ExposureProgram::from_exif),
            shutter_speed: self.real(Tag::ShutterSpeedValue),
            exposure_time: self.real(Tag::ExposureTime),
            f_number: self.real(Tag::FNumber),
            aperture_value: self.real(Tag::ApertureValue),
            focal_length: self.real(Tag::FocalLength),
            iso: self.uint(Tag::PhotographicSensitivity),
        };
        (exif != ExifMetadata::default()).then_some(exif)
    }

    /// Lens details. There is no standard EXIF tag for stabilization, so
    /// `stabilized` is always `false` here.
    pub fn aux(&self) -> Option<ExifAuxMetadata> {
        let aux = ExifAuxMetadata {
            lens_model: self.ascii(Tag::LensModel),
            lens_serial_number: self.ascii(Tag::LensSerialNumber),
            stabilized: false,
        };
        (aux != ExifAuxMetadata::default()).then_some(aux)
    }

    /// GPS position in signed decimal degrees. Both axes must be present.
    pub fn location(&self) -> Option<Location> {
        let latitude = self.coordinate(Tag::GPSLatitude, Tag::GPSLatitudeRef, "S")?;
        let longitude = self.coordinate(Tag::GPSLongitude, Tag::GPSLongitudeRef, "W")?;
        Some(Location {
            latitude,
            longitude,
        })
    }

    fn coordinate(&self, tag: Tag, reference: Tag, negative_ref: &str) -> Option<f64> {
        let Value::Rational(dms) = self.value(tag)? else {
            return None;
        };
        let parts: Vec<f64> = dms.iter().map(|r| r.to_f64()).collect();
        let degrees = dms_to_degrees(&parts)?;
        let negative = self
            .ascii(reference)
            .is_some_and(|r| r.eq_ignore_ascii_case(negative_ref));
        Some(if negative { -degrees } else { degrees })
    }

    /// Copy every field this reader knows about into `properties`.
    /// Dimensions are left alone: the decoder is authoritative for those.
    pub fn fill(&self, properties: &mut ImageProperties) {
        properties.orientation = self.orientation().unwrap_or_default();
        properties.tiff = self.tiff();
        properties.exif = self.exif();
        properties.aux = self.aux();
        properties.location = self.location();
        debug!(
            orientation = ?properties.orientation,
            has_tiff = properties.tiff.is_some(),
            has_exif = properties.exif.is_some(),
            has_location = properties.location.is_some(),
            "read EXIF"
        );
    }
}

/// Parse the EXIF `YYYY:MM:DD HH:MM:SS` timestamp format.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), EXIF_DATETIME_FORMAT).ok()
}

/// Degrees, minutes, seconds to decimal degrees. Accepts one to three
/// components (some writers omit seconds).
pub fn dms_to_degrees(parts: &[f64]) -> Option<f64> {
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| !p.is_finite()) {
        return None;
    }
    let divisors = [1.0, 60.0, 3600.0];
    Some(parts.iter().zip(divisors).map(|(v, d)| v / d).sum())
}
