//! Data models shared by the runner and the vector database clients.
//!
//! These types describe what the harness sends to the service (schemas,
//! sample rows, index and search parameters) and what it reads back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SmokeError};

/// A synthesized row: integer primary key plus one float vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub id: i64,
    pub vector: Vec<f32>,
}

/// Scalar and vector types a schema field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Int64,
    VarChar,
    FloatVector,
}

impl FieldType {
    /// Name used on the wire by the Milvus REST API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int64 => "Int64",
            Self::VarChar => "VarChar",
            Self::FloatVector => "FloatVector",
        }
    }

    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(self, Self::FloatVector)
    }
}

/// One field of a collection schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: FieldType,
    pub is_primary: bool,
    pub auto_id: bool,
    /// Vector dimension; only set on vector fields.
    pub dim: Option<usize>,
}

impl FieldSchema {
    /// A user-assigned `Int64` primary key.
    pub fn primary_int64(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: FieldType::Int64,
            is_primary: true,
            auto_id: false,
            dim: None,
        }
    }

    /// A float vector field of fixed dimension.
    pub fn float_vector(name: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            data_type: FieldType::FloatVector,
            is_primary: false,
            auto_id: false,
            dim: Some(dim),
        }
    }
}

/// Ordered field list plus a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: Vec<FieldSchema>,
    pub description: String,
}

impl CollectionSchema {
    /// Build a schema and check it is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::InvalidSchema`] when there is not exactly one
    /// primary key, a field name repeats, no vector field exists, or a
    /// vector field lacks a positive dimension.
    pub fn new(fields: Vec<FieldSchema>, description: impl Into<String>) -> Result<Self> {
        let schema = Self {
            fields,
            description: description.into(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// The two-field layout the harness verifies with: `id` and `vector`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dim` is zero.
    pub fn id_and_vector(dim: usize, description: impl Into<String>) -> Result<Self> {
        Self::new(
            vec![
                FieldSchema::primary_int64("id"),
                FieldSchema::float_vector("vector", dim),
            ],
            description,
        )
    }

    fn validate(&self) -> Result<()> {
        let primaries = self.fields.iter().filter(|f| f.is_primary).count();
        if primaries != 1 {
            return Err(SmokeError::invalid_schema(format!(
                "expected exactly one primary key, found {primaries}"
            )));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(SmokeError::invalid_schema("field name must not be empty"));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SmokeError::invalid_schema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
            match (field.data_type.is_vector(), field.dim) {
                (true, None | Some(0)) => {
                    return Err(SmokeError::invalid_schema(format!(
                        "vector field '{}' needs a positive dimension",
                        field.name
                    )));
                }
                (false, Some(_)) => {
                    return Err(SmokeError::invalid_schema(format!(
                        "scalar field '{}' cannot declare a dimension",
                        field.name
                    )));
                }
                _ => {}
            }
            if field.is_primary && field.data_type.is_vector() {
                return Err(SmokeError::invalid_schema("a vector field cannot be the primary key"));
            }
        }

        if !self.fields.iter().any(|f| f.data_type.is_vector()) {
            return Err(SmokeError::invalid_schema("schema has no vector field"));
        }
        Ok(())
    }

    /// The primary key field.
    #[must_use]
    pub fn primary_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary)
    }

    /// The first vector field.
    #[must_use]
    pub fn vector_field(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.data_type.is_vector())
    }

    /// Check that every record matches the vector dimension.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::DimensionMismatch`] for the first offending row.
    pub fn check_records(&self, records: &[SampleRecord]) -> Result<()> {
        let expected = self.vector_field().and_then(|f| f.dim).unwrap_or(0);
        for record in records {
            if record.vector.len() != expected {
                return Err(SmokeError::DimensionMismatch {
                    id: record.id,
                    expected,
                    actual: record.vector.len(),
                });
            }
        }
        Ok(())
    }
}

/// Handle to a created collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub schema: CollectionSchema,
}

/// Distance metric used to build the index and rank hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    #[default]
    L2,
    Ip,
    Cosine,
}

impl MetricType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::Ip => "IP",
            Self::Cosine => "COSINE",
        }
    }

    /// Distance reported when a vector is compared with itself, if the
    /// metric has a fixed value for that case.
    #[must_use]
    pub const fn self_distance(self) -> Option<f32> {
        match self {
            Self::L2 => Some(0.0),
            Self::Cosine => Some(1.0),
            Self::Ip => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "L2" => Ok(Self::L2),
            "IP" => Ok(Self::Ip),
            "COSINE" => Ok(Self::Cosine),
            _ => Err(format!("Invalid metric type: {s}")),
        }
    }
}

/// Index structure requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexType {
    Flat,
    #[default]
    IvfFlat,
    IvfSq8,
    #[serde(rename = "AUTOINDEX")]
    AutoIndex,
}

impl IndexType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "FLAT",
            Self::IvfFlat => "IVF_FLAT",
            Self::IvfSq8 => "IVF_SQ8",
            Self::AutoIndex => "AUTOINDEX",
        }
    }

    /// Whether the index is inverted-file based (takes `nlist`/`nprobe`).
    #[must_use]
    pub const fn is_ivf(self) -> bool {
        matches!(self, Self::IvfFlat | Self::IvfSq8)
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IndexType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "FLAT" => Ok(Self::Flat),
            "IVF_FLAT" => Ok(Self::IvfFlat),
            "IVF_SQ8" => Ok(Self::IvfSq8),
            "AUTOINDEX" | "AUTO_INDEX" => Ok(Self::AutoIndex),
            _ => Err(format!("Invalid index type: {s}")),
        }
    }
}

/// Index build request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexParams {
    pub metric: MetricType,
    pub index_type: IndexType,
    /// Build-time tuning parameters such as `nlist`.
    pub params: BTreeMap<String, i64>,
}

impl IndexParams {
    /// Parameters for an index of `index_type`, adding `nlist` for IVF types.
    #[must_use]
    pub fn new(metric: MetricType, index_type: IndexType, nlist: u32) -> Self {
        let mut params = BTreeMap::new();
        if index_type.is_ivf() {
            params.insert("nlist".to_string(), i64::from(nlist));
        }
        Self {
            metric,
            index_type,
            params,
        }
    }
}

/// Nearest-neighbor query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub vectors: Vec<Vec<f32>>,
    pub anns_field: String,
    pub metric: MetricType,
    /// Search-time tuning parameters such as `nprobe`.
    pub params: BTreeMap<String, i64>,
    pub limit: usize,
    pub output_fields: Vec<String>,
}

impl SearchRequest {
    /// A single-vector query against `anns_field`.
    #[must_use]
    pub fn single(
        vector: Vec<f32>,
        anns_field: impl Into<String>,
        metric: MetricType,
        index_type: IndexType,
        nprobe: u32,
        limit: usize,
    ) -> Self {
        let mut params = BTreeMap::new();
        if index_type.is_ivf() {
            params.insert("nprobe".to_string(), i64::from(nprobe));
        }
        Self {
            vectors: vec![vector],
            anns_field: anns_field.into(),
            metric,
            params,
            limit,
            output_fields: Vec::new(),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub distance: f32,
}

/// Hits for one query vector, best first.
pub type ResultSet = Vec<SearchHit>;

/// Outcome of a batch insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertResult {
    pub insert_count: usize,
}

/// Whether the service can serve queries for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    NotExist,
    NotLoad,
    Loading { progress: u8 },
    Loaded,
}

impl LoadState {
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotExist => f.write_str("not exist"),
            Self::NotLoad => f.write_str("not loaded"),
            Self::Loading { progress } => write!(f, "loading ({progress}%)"),
            Self::Loaded => f.write_str("loaded"),
        }
    }
}
