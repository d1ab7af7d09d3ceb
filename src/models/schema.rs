//! Schema-related data models.
//!
//! This module defines the normalized column description returned by
//! schema introspection.

use crate::db::types::TypeDescriptor;
use indexmap::IndexMap;
use serde::Serialize;

/// Columns of a table keyed by column name, in ordinal order.
pub type ColumnMap = IndexMap<String, ColumnInfo>;

/// A column description: the normalized type descriptor merged with the
/// backend's own metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    #[serde(flatten)]
    pub datatype: TypeDescriptor,
    pub column_name: String,
    pub column_default: Option<String>,
    /// Bare type name, without length and modifiers stripped by the driver
    pub data_type: String,
    pub is_nullable: bool,
    /// 1-based
    pub ordinal_position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<u32>,
    /// Integer display width (MySQL only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collation_name: Option<String>,
    /// Allowed values of ENUM and SET columns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// MySQL only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// MySQL only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    /// MySQL only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// MySQL only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileges: Option<String>,
}

impl ColumnInfo {
    /// Create a new column description.
    pub fn new(
        column_name: impl Into<String>,
        data_type: impl Into<String>,
        datatype: TypeDescriptor,
        ordinal_position: u32,
    ) -> Self {
        Self {
            datatype,
            column_name: column_name.into(),
            column_default: None,
            data_type: data_type.into(),
            is_nullable: false,
            ordinal_position,
            numeric_precision: None,
            numeric_scale: None,
            display: None,
            collation_name: None,
            options: None,
            comment: None,
            extra: None,
            key: None,
            privileges: None,
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.column_default = default;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    /// Set the maximum character (or byte) length, overriding the registry's.
    pub fn with_max_length(mut self, length: Option<u64>) -> Self {
        if length.is_some() {
            self.datatype.max_length = length;
        }
        self
    }

    pub fn with_collation(mut self, collation: Option<String>) -> Self {
        self.collation_name = collation;
        self
    }
}
