//! Records stored in the catalog.

use crate::metadata::Metadata;
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Integer-coded enum persisted as a SQLite `INTEGER` column.
macro_rules! sql_enum {
    ($name:ident { $($variant:ident = $code:literal => $label:literal),+ $(,)? }) => {
        impl $name {
            pub fn code(self) -> i64 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.code()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let code = i64::column_result(value)?;
                Self::from_code(code).ok_or(FromSqlError::OutOfRange(code))
            }
        }
    };
}

/// How an asset entered the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetOrigin {
    Files,
    ShareExtension,
}

sql_enum!(AssetOrigin {
    Files = 0 => "files",
    ShareExtension = 1 => "share-extension",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationType {
    Original,
    Thumbnail,
}

sql_enum!(RepresentationType {
    Original = 0 => "original",
    Thumbnail = 1 => "thumbnail",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagType {
    Accepted,
    Rejected,
    UserCreated,
}

sql_enum!(TagType {
    Accepted = 0 => "accepted",
    Rejected = 1 => "rejected",
    UserCreated = 2 => "user",
});

impl TagType {
    /// Accepted and rejected are mutually exclusive on an asset.
    pub fn is_status(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

/// A label, shared between assets and keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: String,
    pub tag_type: TagType,
}

impl Tag {
    pub const ACCEPTED: &'static str = "accepted";
    pub const REJECTED: &'static str = "rejected";

    pub fn accepted() -> Self {
        Self {
            name: Self::ACCEPTED.to_string(),
            tag_type: TagType::Accepted,
        }
    }

    pub fn rejected() -> Self {
        Self {
            name: Self::REJECTED.to_string(),
            tag_type: TagType::Rejected,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_type: TagType::UserCreated,
        }
    }
}

/// One stored rendition. The identifier is the SHA-256 of the blob and
/// names the file in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Representation {
    pub identifier: String,
    pub representation_type: RepresentationType,
}

/// One imported photograph with everything it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub identifier: Uuid,
    pub origin: AssetOrigin,
    pub name: String,
    /// Uniform type identifier of the original, e.g. `public.jpeg`.
    pub uti: String,
    pub metadata: Option<Metadata>,
    /// In insertion order.
    pub representations: Vec<Representation>,
    /// Sorted by name.
    pub tags: Vec<Tag>,
}

impl Asset {
    /// A new asset with a fresh identifier and nothing attached.
    pub fn new(origin: AssetOrigin, name: impl Into<String>, uti: impl Into<String>) -> Self {
        Self {
            identifier: Uuid::new_v4(),
            origin,
            name: name.into(),
            uti: uti.into(),
            metadata: None,
            representations: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn representation(&self, representation_type: RepresentationType) -> Option<&Representation> {
        self.representations
            .iter()
            .find(|r| r.representation_type == representation_type)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    pub fn is_accepted(&self) -> bool {
        self.tags.iter().any(|t| t.tag_type == TagType::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        self.tags.iter().any(|t| t.tag_type == TagType::Rejected)
    }
}
