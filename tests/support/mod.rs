//! Shared fakes for integration tests.
//!
//! - [`FakeMilvus`]: in-memory `Connector`/`VectorStore` with brute-force L2
//!   search and switchable faults.
//! - [`FakeHttpServer`]: axum server on an ephemeral port that speaks enough
//!   of the Milvus REST v2 API, plus gRPC `GetVersion`, for the real client.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::future::{Ready, ready};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tonic::codec::ProstCodec;
use tonic::server::UnaryService;

use milvus_smoke::grpc::{GET_VERSION, GetVersionRequest, GetVersionResponse, RpcStatus};

use milvus_smoke::{
    Collection, CollectionSchema, ConnectOptions, Connector, IndexParams, InsertResult,
    LoadState, ResultSet, RunPlan, SampleRecord, SearchHit, SearchRequest, SmokeError,
    VectorStore,
};

pub const FAKE_VERSION: &str = "v2.4.5";

/// Plan with short load timings so failure cases finish quickly.
pub fn fast_plan() -> RunPlan {
    RunPlan {
        seed: Some(42),
        load_timeout: Duration::from_millis(200),
        load_poll_interval: Duration::from_millis(10),
        ..RunPlan::default()
    }
}

/// Squared Euclidean distance, which is what Milvus reports for L2.
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(rows: &[SampleRecord], query: &[f32], limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = rows
        .iter()
        .map(|r| SearchHit {
            id: r.id,
            distance: l2(&r.vector, query),
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(limit);
    hits
}

// =============================================================================
// In-memory fake
// =============================================================================

/// Faults the in-memory service can be told to produce.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub unreachable: bool,
    pub version_unavailable: bool,
    /// Report this insert count instead of the real one.
    pub insert_count: Option<usize>,
    pub reject_index: bool,
    /// Never leave the loading state.
    pub load_stuck: bool,
    /// Put this id at the top of every search result.
    pub top_hit: Option<i64>,
    pub search_empty: bool,
    pub disconnect_fails: bool,
}

#[derive(Debug, Clone)]
pub struct FakeCollection {
    pub schema: CollectionSchema,
    pub rows: Vec<SampleRecord>,
    pub indexed: bool,
    pub loaded: bool,
    pub load_polls: u32,
}

impl FakeCollection {
    fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            indexed: false,
            loaded: false,
            load_polls: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub collections: BTreeMap<String, FakeCollection>,
    pub calls: Vec<&'static str>,
    pub connections: usize,
    pub disconnects: usize,
    pub drops: usize,
}

/// In-memory vector service shared by every connection it hands out.
#[derive(Debug, Clone, Default)]
pub struct FakeMilvus {
    state: Arc<Mutex<ServerState>>,
    faults: Faults,
}

impl FakeMilvus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    /// Pretend a previous run left a collection behind.
    pub fn seed_collection(&self, name: &str, rows: Vec<SampleRecord>) {
        let schema = CollectionSchema::id_and_vector(128, "leftover").unwrap();
        let mut collection = FakeCollection::new(schema);
        collection.rows = rows;
        self.state().collections.insert(name.to_string(), collection);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl Connector for FakeMilvus {
    type Store = FakeStore;

    async fn connect(&self, options: &ConnectOptions) -> milvus_smoke::Result<FakeStore> {
        if self.faults.unreachable {
            return Err(SmokeError::Unreachable {
                endpoint: options.endpoint(),
                reason: "connection refused or host unreachable".into(),
            });
        }
        let mut state = self.state();
        state.connections += 1;
        state.calls.push("connect");
        drop(state);
        Ok(FakeStore {
            state: Arc::clone(&self.state),
            faults: self.faults.clone(),
            alias: options.alias.clone(),
            open: true,
        })
    }
}

pub struct FakeStore {
    state: Arc<Mutex<ServerState>>,
    faults: Faults,
    alias: String,
    open: bool,
}

impl FakeStore {
    fn enter(&self, call: &'static str) -> milvus_smoke::Result<MutexGuard<'_, ServerState>> {
        if !self.open {
            return Err(SmokeError::Disconnected {
                alias: self.alias.clone(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        Ok(state)
    }
}

fn missing(operation: &'static str, name: &str) -> SmokeError {
    SmokeError::service(operation, 100, format!("collection not found[collection={name}]"))
}

#[async_trait]
impl VectorStore for FakeStore {
    fn alias(&self) -> &str {
        &self.alias
    }

    async fn server_version(&self) -> milvus_smoke::Result<String> {
        self.enter("server_version")?;
        if self.faults.version_unavailable {
            return Err(SmokeError::HttpStatus {
                endpoint: "fake/version".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(FAKE_VERSION.to_string())
    }

    async fn has_collection(&self, name: &str) -> milvus_smoke::Result<bool> {
        Ok(self.enter("has_collection")?.collections.contains_key(name))
    }

    async fn drop_collection(&self, name: &str) -> milvus_smoke::Result<()> {
        let mut state = self.enter("drop_collection")?;
        if state.collections.remove(name).is_some() {
            state.drops += 1;
        }
        Ok(())
    }

    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> milvus_smoke::Result<Collection> {
        let mut state = self.enter("create_collection")?;
        if state.collections.contains_key(name) {
            return Err(SmokeError::service(
                "create collection",
                65535,
                format!("collection {name} already exists"),
            ));
        }
        state
            .collections
            .insert(name.to_string(), FakeCollection::new(schema.clone()));
        Ok(Collection {
            name: name.to_string(),
            schema: schema.clone(),
        })
    }

    async fn insert(
        &self,
        collection: &str,
        rows: &[SampleRecord],
    ) -> milvus_smoke::Result<InsertResult> {
        let mut state = self.enter("insert")?;
        let target = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing("insert", collection))?;
        target.rows.extend_from_slice(rows);
        Ok(InsertResult {
            insert_count: self.faults.insert_count.unwrap_or(rows.len()),
        })
    }

    async fn create_index(
        &self,
        collection: &str,
        _field: &str,
        _params: &IndexParams,
    ) -> milvus_smoke::Result<()> {
        let mut state = self.enter("create_index")?;
        if self.faults.reject_index {
            return Err(SmokeError::service(
                "create index",
                1100,
                "invalid parameter[nlist out of range]",
            ));
        }
        let target = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing("create index", collection))?;
        target.indexed = true;
        Ok(())
    }

    async fn load(&self, collection: &str) -> milvus_smoke::Result<()> {
        let mut state = self.enter("load")?;
        let target = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| missing("load collection", collection))?;
        if !target.indexed {
            return Err(SmokeError::service("load collection", 700, "index not found"));
        }
        Ok(())
    }

    async fn load_state(&self, collection: &str) -> milvus_smoke::Result<LoadState> {
        let mut state = self.enter("load_state")?;
        let Some(target) = state.collections.get_mut(collection) else {
            return Ok(LoadState::NotExist);
        };
        target.load_polls += 1;
        // First poll reports progress, the next one completes.
        if self.faults.load_stuck || target.load_polls == 1 {
            return Ok(LoadState::Loading { progress: 50 });
        }
        target.loaded = true;
        Ok(LoadState::Loaded)
    }

    async fn search(
        &self,
        collection: &str,
        request: &SearchRequest,
    ) -> milvus_smoke::Result<Vec<ResultSet>> {
        let state = self.enter("search")?;
        let target = state
            .collections
            .get(collection)
            .ok_or_else(|| missing("search", collection))?;
        if !target.loaded {
            return Err(SmokeError::service("search", 101, "collection not loaded"));
        }
        Ok(request
            .vectors
            .iter()
            .map(|query| {
                if self.faults.search_empty {
                    return Vec::new();
                }
                let mut hits = nearest(&target.rows, query, request.limit);
                if let Some(id) = self.faults.top_hit {
                    hits.insert(0, SearchHit { id, distance: 0.5 });
                    hits.truncate(request.limit);
                }
                hits
            })
            .collect())
    }

    async fn disconnect(&mut self) -> milvus_smoke::Result<()> {
        let mut state = self.enter("disconnect")?;
        if self.faults.disconnect_fails {
            return Err(SmokeError::Disconnected {
                alias: self.alias.clone(),
            });
        }
        state.disconnects += 1;
        drop(state);
        self.open = false;
        Ok(())
    }
}

// =============================================================================
// Fake HTTP server
// =============================================================================

/// One request as the fake server received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    /// JSON body; `Null` when empty, a string when not JSON.
    pub body: Value,
}

/// Handler mapping a request to `(status, body)`.
pub type Handler = Arc<dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync>;

/// How the fake answers `MilvusService.GetVersion` over gRPC.
#[derive(Debug, Clone)]
pub struct GrpcVersion {
    pub version: String,
    /// Require `authorization: base64(token)` metadata.
    pub token: Option<String>,
}

#[derive(Clone)]
struct HttpServerState {
    handler: Handler,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    grpc: Option<GrpcVersion>,
}

impl HttpServerState {
    fn record(&self, request: RecordedRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

pub struct FakeHttpServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeHttpServer {
    /// Bind an ephemeral port and serve `handler` for every route until
    /// dropped. No gRPC methods are served.
    pub async fn start(
        handler: impl Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    ) -> Self {
        Self::serve(Arc::new(handler), None).await
    }

    /// Start a server emulating a healthy Milvus.
    pub async fn milvus() -> Self {
        Self::milvus_with(RestFaults::default()).await
    }

    pub async fn milvus_with(faults: RestFaults) -> Self {
        let grpc = (!faults.no_grpc).then(|| GrpcVersion {
            version: FAKE_VERSION.to_string(),
            token: faults.token.clone(),
        });
        let emulator = RestEmulator::new(faults);
        let handler: Handler = Arc::new(move |request: &RecordedRequest| emulator.handle(request));
        Self::serve(handler, grpc).await
    }

    async fn serve(handler: Handler, grpc: Option<GrpcVersion>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = HttpServerState {
            handler,
            requests: Arc::clone(&requests),
            grpc,
        };
        let app = Router::new()
            .route(GET_VERSION, post(get_version))
            .fallback(rest)
            .with_state(state);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn options(&self) -> ConnectOptions {
        ConnectOptions {
            host: "127.0.0.1".into(),
            port: self.port(),
            ..ConnectOptions::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    pub fn last_request(&self, path: &str) -> Option<RecordedRequest> {
        self.requests().into_iter().rev().find(|r| r.path == path)
    }
}

impl Drop for FakeHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn rest(
    State(state): State<HttpServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: authorization(&headers),
        body,
    };
    state.record(request.clone());

    let (status, payload) = (state.handler)(&request);
    let status = StatusCode::from_u16(status).unwrap();
    (status, [(CONTENT_TYPE, "application/json")], payload).into_response()
}

async fn get_version(State(state): State<HttpServerState>, request: Request) -> Response {
    state.record(RecordedRequest {
        method: request.method().to_string(),
        path: GET_VERSION.to_string(),
        authorization: authorization(request.headers()),
        body: Value::Null,
    });

    // A server without the method answers like any unknown route.
    let Some(reply) = state.grpc.clone() else {
        return (StatusCode::NOT_FOUND, "404 page not found").into_response();
    };
    let codec = ProstCodec::<GetVersionResponse, GetVersionRequest>::default();
    let mut grpc = tonic::server::Grpc::new(codec);
    grpc.unary(VersionService(reply), request).await.into_response()
}

struct VersionService(GrpcVersion);

impl UnaryService<GetVersionRequest> for VersionService {
    type Response = GetVersionResponse;
    type Future = Ready<Result<tonic::Response<GetVersionResponse>, tonic::Status>>;

    fn call(&mut self, request: tonic::Request<GetVersionRequest>) -> Self::Future {
        if let Some(token) = &self.0.token {
            let sent = request
                .metadata()
                .get("authorization")
                .and_then(|v| v.to_str().ok());
            if sent != Some(STANDARD.encode(token).as_str()) {
                return ready(Err(tonic::Status::unauthenticated(
                    "auth check failure, please check username and password are correct",
                )));
            }
        }
        ready(Ok(tonic::Response::new(GetVersionResponse {
            status: Some(RpcStatus::default()),
            version: self.0.version.clone(),
        })))
    }
}

// =============================================================================
// Milvus REST emulation
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RestFaults {
    /// Do not serve the gRPC `GetVersion` method.
    pub no_grpc: bool,
    /// Answer `GET` on this path with the plain version string.
    pub http_version_path: Option<String>,
    /// Reject index creation with this service code.
    pub index_error_code: Option<i64>,
    /// Return ids as strings in search hits.
    pub string_ids: bool,
    /// Require this token on every call, as a bearer header over REST and
    /// as base64 `authorization` metadata over gRPC.
    pub token: Option<String>,
}

#[derive(Default)]
struct RestState {
    collections: BTreeMap<String, Vec<SampleRecord>>,
    loaded: BTreeMap<String, bool>,
}

struct RestEmulator {
    faults: RestFaults,
    state: Mutex<RestState>,
}

fn ok(data: Value) -> (u16, String) {
    (200, json!({"code": 0, "data": data}).to_string())
}

fn rejected(code: i64, message: &str) -> (u16, String) {
    (200, json!({"code": code, "message": message}).to_string())
}

impl RestEmulator {
    fn new(faults: RestFaults) -> Self {
        Self {
            faults,
            state: Mutex::new(RestState::default()),
        }
    }

    fn handle(&self, request: &RecordedRequest) -> (u16, String) {
        if let Some(token) = &self.faults.token {
            let expected = format!("Bearer {token}");
            if request.authorization.as_deref() != Some(expected.as_str()) {
                return rejected(1800, "user hasn't authenticated");
            }
        }

        if self.faults.http_version_path.as_deref() == Some(request.path.as_str()) {
            return (200, FAKE_VERSION.to_string());
        }

        let body = &request.body;
        let name = body["collectionName"].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock().unwrap();

        match request.path.as_str() {
            "/v2/vectordb/collections/list" => {
                ok(json!(state.collections.keys().collect::<Vec<_>>()))
            }
            "/v2/vectordb/collections/has" => {
                ok(json!({"has": state.collections.contains_key(&name)}))
            }
            "/v2/vectordb/collections/drop" => {
                state.collections.remove(&name);
                state.loaded.remove(&name);
                ok(json!({}))
            }
            "/v2/vectordb/collections/create" => {
                if state.collections.contains_key(&name) {
                    return rejected(65535, "collection already exists");
                }
                state.collections.insert(name, Vec::new());
                ok(json!({}))
            }
            "/v2/vectordb/entities/insert" => {
                let rows: Vec<SampleRecord> =
                    serde_json::from_value(body["data"].clone()).unwrap_or_default();
                let count = rows.len();
                match state.collections.get_mut(&name) {
                    Some(stored) => {
                        stored.extend(rows);
                        ok(json!({"insertCount": count, "insertIds": []}))
                    }
                    None => rejected(100, "collection not found"),
                }
            }
            "/v2/vectordb/indexes/create" => match self.faults.index_error_code {
                Some(code) => rejected(code, "invalid index params"),
                None => ok(json!({})),
            },
            "/v2/vectordb/collections/load" => {
                state.loaded.insert(name, true);
                ok(json!({}))
            }
            "/v2/vectordb/collections/get_load_state" => {
                let load_state = if !state.collections.contains_key(&name) {
                    "LoadStateNotExist"
                } else if state.loaded.get(&name).copied().unwrap_or(false) {
                    "LoadStateLoaded"
                } else {
                    "LoadStateNotLoad"
                };
                ok(json!({"loadState": load_state, "loadProgress": 100}))
            }
            "/v2/vectordb/entities/search" => {
                let Some(rows) = state.collections.get(&name) else {
                    return rejected(100, "collection not found");
                };
                let limit = body["limit"].as_u64().unwrap_or(10) as usize;
                let query: Vec<f32> =
                    serde_json::from_value(body["data"][0].clone()).unwrap_or_default();
                let hits: Vec<Value> = nearest(rows, &query, limit)
                    .into_iter()
                    .map(|hit| {
                        let id = if self.faults.string_ids {
                            json!(hit.id.to_string())
                        } else {
                            json!(hit.id)
                        };
                        json!({"id": id, "distance": hit.distance})
                    })
                    .collect();
                ok(Value::Array(hits))
            }
            _ => (404, "404 page not found".into()),
        }
    }
}
