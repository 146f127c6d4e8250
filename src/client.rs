//! Client contract for the vector database under test.
//!
//! The runner only talks to the service through [`Connector`] and
//! [`VectorStore`]. [`crate::milvus`] provides the Milvus implementation;
//! tests plug in in-memory fakes.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::model::{
    Collection, CollectionSchema, IndexParams, InsertResult, LoadState, ResultSet,
    SampleRecord, SearchRequest,
};

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Name the connection is registered under.
    pub alias: String,
    pub host: String,
    pub port: u16,
    /// Use HTTPS instead of HTTP.
    pub secure: bool,
    /// Bearer token (`user:password` or an API key).
    pub token: Option<String>,
    /// Database to operate in; the service default when unset.
    pub database: Option<String>,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// HTTP path to read the server version from. `None` asks the gRPC
    /// `GetVersion` method on the same port.
    pub version_path: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            alias: "default".to_string(),
            host: "localhost".to_string(),
            port: 19530,
            secure: false,
            token: None,
            database: None,
            request_timeout: None,
            version_path: None,
        }
    }
}

impl ConnectOptions {
    /// Base URL of the service, e.g. `http://localhost:19530`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Opens connections to a vector database.
#[async_trait]
pub trait Connector: Send + Sync {
    type Store: VectorStore;

    /// Open a connection and confirm the service answers.
    async fn connect(&self, options: &ConnectOptions) -> Result<Self::Store>;
}

/// An open connection to a vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name the connection was opened under.
    fn alias(&self) -> &str;

    async fn server_version(&self) -> Result<String>;

    async fn has_collection(&self, name: &str) -> Result<bool>;

    async fn drop_collection(&self, name: &str) -> Result<()>;

    async fn create_collection(&self, name: &str, schema: &CollectionSchema)
    -> Result<Collection>;

    async fn insert(&self, collection: &str, rows: &[SampleRecord]) -> Result<InsertResult>;

    async fn create_index(&self, collection: &str, field: &str, params: &IndexParams)
    -> Result<()>;

    /// Ask the service to load the collection. May return before loading
    /// finishes; poll [`VectorStore::load_state`] to wait.
    async fn load(&self, collection: &str) -> Result<()>;

    async fn load_state(&self, collection: &str) -> Result<LoadState>;

    /// One result set per query vector, hits ordered best first.
    async fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<ResultSet>>;

    /// Release the connection. Later calls fail with
    /// [`crate::SmokeError::Disconnected`].
    async fn disconnect(&mut self) -> Result<()>;
}
