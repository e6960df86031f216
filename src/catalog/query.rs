//! Asset queries: predicates, sort order and record loading.
//!
//! A [`Predicate`] is a small boolean expression tree over asset fields. It
//! compiles to a SQL `WHERE` fragment with positional parameters, so
//! filtering happens inside SQLite rather than after loading every asset.

use super::CatalogError;
use super::model::{Asset, AssetOrigin, Representation, Tag, TagType};
use crate::imaging::{Dimensions, NormalizedHistogram};
use crate::metadata::{Location, Metadata, Orientation};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use uuid::Uuid;

/// Boolean expression over asset fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    /// The asset carries a tag with this name.
    HasTag(String),
    /// The asset carries any tag of this type.
    HasTagType(TagType),
    NameEquals(String),
    /// Case-sensitive substring match on the name.
    NameContains(String),
    Origin(AssetOrigin),
    Uti(String),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn has_tag(name: impl Into<String>) -> Self {
        Self::HasTag(name.into())
    }

    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Append this predicate as SQL over the `a` (assets) alias, pushing
    /// parameters in placeholder order.
    fn to_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Self::All => sql.push_str("1"),
            Self::HasTag(name) => {
                sql.push_str(
                    "EXISTS (SELECT 1 FROM asset_tags x WHERE x.asset_id = a.id AND x.tag_name = ?)",
                );
                params.push(Value::Text(name.clone()));
            }
            Self::HasTagType(tag_type) => {
                sql.push_str(
                    "EXISTS (SELECT 1 FROM asset_tags x JOIN tags t ON t.name = x.tag_name \
                     WHERE x.asset_id = a.id AND t.type = ?)",
                );
                params.push(Value::Integer(tag_type.code()));
            }
            Self::NameEquals(name) => {
                sql.push_str("a.name = ?");
                params.push(Value::Text(name.clone()));
            }
            Self::NameContains(needle) => {
                sql.push_str("instr(a.name, ?) > 0");
                params.push(Value::Text(needle.clone()));
            }
            Self::Origin(origin) => {
                sql.push_str("a.origin = ?");
                params.push(Value::Integer(origin.code()));
            }
            Self::Uti(uti) => {
                sql.push_str("a.uti = ?");
                params.push(Value::Text(uti.clone()));
            }
            Self::Not(inner) => {
                sql.push_str("NOT (");
                inner.to_sql(sql, params);
                sql.push(')');
            }
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                let op = if matches!(self, Self::And(..)) { "AND" } else { "OR" };
                sql.push('(');
                lhs.to_sql(sql, params);
                sql.push_str(") ");
                sql.push_str(op);
                sql.push_str(" (");
                rhs.to_sql(sql, params);
                sql.push(')');
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Uti,
    Origin,
    Identifier,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            Self::Name => "a.name",
            Self::Uti => "a.uti",
            Self::Origin => "a.origin",
            Self::Identifier => "a.id",
        }
    }
}

/// What to fetch and in which order. Defaults to every asset by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub predicate: Predicate,
    pub sort: SortKey,
    pub ascending: bool,
}

impl Default for AssetRequest {
    fn default() -> Self {
        Self {
            predicate: Predicate::All,
            sort: SortKey::Name,
            ascending: true,
        }
    }
}

impl AssetRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(predicate: Predicate) -> Self {
        Self {
            predicate,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sorted_by(mut self, sort: SortKey, ascending: bool) -> Self {
        self.sort = sort;
        self.ascending = ascending;
        self
    }

    /// Full `SELECT` for the asset rows. Ties on the sort key are broken by
    /// identifier so the order is total.
    fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT a.id, a.origin, a.name, a.uti FROM assets a WHERE ");
        let mut params = Vec::new();
        self.predicate.to_sql(&mut sql, &mut params);
        let dir = if self.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(" ORDER BY {} {dir}, a.id {dir}", self.sort.column()));
        (sql, params)
    }
}

/// Snapshot of a query's results.
///
/// [`refresh`](Self::refresh) re-runs the request and reports what changed,
/// which is how a holder keeps its view in step with the catalog.
#[derive(Debug, Clone)]
pub struct Results {
    request: AssetRequest,
    assets: Vec<Asset>,
}

impl Results {
    pub(crate) fn new(request: AssetRequest, assets: Vec<Asset>) -> Self {
        Self { request, assets }
    }

    pub fn request(&self) -> &AssetRequest {
        &self.request
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Asset> {
        self.assets.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Asset> {
        self.assets.iter()
    }

    pub fn into_vec(self) -> Vec<Asset> {
        self.assets
    }

    /// Re-run the request against `catalog` and return the differences.
    pub fn refresh(
        &mut self,
        catalog: &super::Catalog,
    ) -> Result<super::changes::ChangeSet, CatalogError> {
        let fresh = catalog.query(&self.request)?.into_vec();
        let changes = super::changes::diff(&self.assets, &fresh, |a| a.identifier);
        self.assets = fresh;
        Ok(changes)
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a Asset;
    type IntoIter = std::slice::Iter<'a, Asset>;

    fn into_iter(self) -> Self::IntoIter {
        self.assets.iter()
    }
}

// =========================================================================
// Loading
// =========================================================================

fn parse_uuid(idx: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

struct AssetRow {
    id: Uuid,
    origin: AssetOrigin,
    name: String,
    uti: String,
}

fn asset_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssetRow> {
    Ok(AssetRow {
        id: parse_uuid(0, row.get(0)?)?,
        origin: row.get(1)?,
        name: row.get(2)?,
        uti: row.get(3)?,
    })
}

/// Every asset matching `request`, fully loaded, in request order.
pub(crate) fn load_assets(
    conn: &Connection,
    request: &AssetRequest,
) -> Result<Vec<Asset>, CatalogError> {
    let (sql, values) = request.to_sql();
    let rows = {
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.query_map(params_from_iter(values.iter()), asset_row)?
            .collect::<Result<Vec<_>, _>>()?
    };
    rows.into_iter().map(|row| hydrate(conn, row)).collect()
}

pub(crate) fn load_asset(conn: &Connection, id: Uuid) -> Result<Option<Asset>, CatalogError> {
    let row = conn
        .prepare_cached("SELECT id, origin, name, uti FROM assets WHERE id = ?1")?
        .query_row([id.to_string()], asset_row)
        .optional()?;
    row.map(|row| hydrate(conn, row)).transpose()
}

fn hydrate(conn: &Connection, row: AssetRow) -> Result<Asset, CatalogError> {
    let key = row.id.to_string();
    Ok(Asset {
        identifier: row.id,
        origin: row.origin,
        name: row.name,
        uti: row.uti,
        metadata: load_metadata(conn, &key)?,
        representations: load_representations(conn, &key)?,
        tags: load_tags(conn, &key)?,
    })
}

fn load_representations(conn: &Connection, key: &str) -> Result<Vec<Representation>, CatalogError> {
    let mut stmt = conn.prepare_cached(
        "SELECT representation_id, type FROM asset_representations
         WHERE asset_id = ?1 ORDER BY position",
    )?;
    let reps = stmt
        .query_map([key], |row| {
            Ok(Representation {
                identifier: row.get(0)?,
                representation_type: row.get(1)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(reps)
}

fn load_tags(conn: &Connection, key: &str) -> Result<Vec<Tag>, CatalogError> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name, t.type FROM asset_tags x
         JOIN tags t ON t.name = x.tag_name
         WHERE x.asset_id = ?1 ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map([key], |row| {
            Ok(Tag {
                name: row.get(0)?,
                tag_type: row.get(1)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(tags)
}

struct MetadataRow {
    width: u32,
    height: u32,
    orientation: u32,
    tiff: Option<String>,
    exif: Option<String>,
    exif_aux: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    histogram: Vec<u8>,
}

fn load_metadata(conn: &Connection, key: &str) -> Result<Option<Metadata>, CatalogError> {
    let row = conn
        .prepare_cached(
            "SELECT width, height, orientation, tiff, exif, exif_aux, latitude, longitude, histogram
             FROM metadata WHERE asset_id = ?1",
        )?
        .query_row([key], |row| {
            Ok(MetadataRow {
                width: row.get(0)?,
                height: row.get(1)?,
                orientation: row.get(2)?,
                tiff: row.get(3)?,
                exif: row.get(4)?,
                exif_aux: row.get(5)?,
                latitude: row.get(6)?,
                longitude: row.get(7)?,
                histogram: row.get(8)?,
            })
        })
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let histogram = NormalizedHistogram::decode(&row.histogram).ok_or_else(|| {
        CatalogError::Corrupt(format!(
            "histogram of asset {key} is {} bytes",
            row.histogram.len()
        ))
    })?;
    Ok(Some(Metadata {
        dimensions: Dimensions {
            width: row.width,
            height: row.height,
        },
        orientation: Orientation::from_exif(row.orientation).ok_or_else(|| {
            CatalogError::Corrupt(format!(
                "orientation of asset {key} is {}",
                row.orientation
            ))
        })?,
        tiff: from_json(row.tiff)?,
        exif: from_json(row.exif)?,
        aux: from_json(row.exif_aux)?,
        location: row
            .latitude
            .zip(row.longitude)
            .map(|(latitude, longitude)| Location {
                latitude,
                longitude,
            }),
        histogram,
    }))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: Option<String>) -> serde_json::Result<Option<T>> {
    raw.map(|s| serde_json::from_str(&s)).transpose()
}

fn to_json<T: serde::Serialize>(value: Option<&T>) -> serde_json::Result<Option<String>> {
    value.map(serde_json::to_string).transpose()
}

/// Write the metadata row for `key`, replacing any previous one.
pub(crate) fn store_metadata(
    conn: &Connection,
    key: &str,
    metadata: &Metadata,
) -> Result<(), CatalogError> {
    let tiff = to_json(metadata.tiff.as_ref())?;
    let exif = to_json(metadata.exif.as_ref())?;
    let aux = to_json(metadata.aux.as_ref())?;
    conn.prepare_cached(
        "INSERT OR REPLACE INTO metadata
         (asset_id, width, height, orientation, tiff, exif, exif_aux, latitude, longitude, histogram)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?
    .execute(params![
        key,
        metadata.dimensions.width,
        metadata.dimensions.height,
        metadata.orientation.exif_value(),
        tiff,
        exif,
        aux,
        metadata.location.map(|l| l.latitude),
        metadata.location.map(|l| l.longitude),
        metadata.histogram.encode(),
    ])?;
    Ok(())
}
