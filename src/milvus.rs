//! Milvus client over the RESTful API v2.
//!
//! Every call is a `POST /v2/vectordb/<resource>/<action>` with a JSON body.
//! Responses share one envelope:
//!
//! ```json
//! { "code": 0, "data": { ... }, "message": "" }
//! ```
//!
//! A non-zero `code` (other than the legacy `200`) is a service rejection
//! and surfaces as [`SmokeError::Service`]. HTTP-level failures surface as
//! [`SmokeError::HttpStatus`] and transport failures as
//! [`SmokeError::Transport`].
//!
//! The server version is the exception: it comes from gRPC (see
//! [`crate::grpc`]) unless [`ConnectOptions::version_path`] names an HTTP
//! path to `GET` instead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::client::{ConnectOptions, Connector, VectorStore};
use crate::error::{Result, SmokeError};
use crate::grpc;
use crate::model::{
    Collection, CollectionSchema, IndexParams, InsertResult, LoadState, ResultSet,
    SampleRecord, SearchHit, SearchRequest,
};

const LIST_COLLECTIONS: &str = "/v2/vectordb/collections/list";
const HAS_COLLECTION: &str = "/v2/vectordb/collections/has";
const DROP_COLLECTION: &str = "/v2/vectordb/collections/drop";
const CREATE_COLLECTION: &str = "/v2/vectordb/collections/create";
const LOAD_COLLECTION: &str = "/v2/vectordb/collections/load";
const GET_LOAD_STATE: &str = "/v2/vectordb/collections/get_load_state";
const INSERT_ENTITIES: &str = "/v2/vectordb/entities/insert";
const SEARCH_ENTITIES: &str = "/v2/vectordb/entities/search";
const CREATE_INDEX: &str = "/v2/vectordb/indexes/create";

/// Opens [`MilvusClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilvusConnector;

impl MilvusConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MilvusConnector {
    type Store = MilvusClient;

    async fn connect(&self, options: &ConnectOptions) -> Result<MilvusClient> {
        let endpoint = options.endpoint();

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| SmokeError::Unreachable {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let client = MilvusClient {
            http,
            endpoint,
            options: options.clone(),
            closed: false,
        };

        // The REST API is stateless, so list collections once to prove the service answers.
        match client.list_collections().await {
            Ok(existing) => {
                info!(
                    alias = %client.options.alias,
                    endpoint = %client.endpoint,
                    collections = existing.len(),
                    "Connected"
                );
                Ok(client)
            }
            Err(SmokeError::Transport { endpoint, source }) => Err(SmokeError::Unreachable {
                endpoint,
                reason: transport_reason(&source),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Open connection to a Milvus proxy.
#[derive(Debug)]
pub struct MilvusClient {
    http: Client,
    endpoint: String,
    options: ConnectOptions,
    closed: bool,
}

impl MilvusClient {
    /// Base URL this client talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Names of the collections in the current database.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let body = DatabaseRequest {
            db_name: self.options.database.as_deref(),
        };
        let envelope = self.post("list collections", LIST_COLLECTIONS, &body).await?;
        decode_data(&envelope, "list collections")
    }

    async fn version_over_http(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.endpoint);
        debug!(%url, "GET");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.options.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|source| SmokeError::Transport {
            endpoint: url.clone(),
            source,
        })?;
        let text = read_body(&url, response).await?;
        parse_version(&text)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SmokeError::Disconnected {
                alias: self.options.alias.clone(),
            });
        }
        Ok(())
    }

    fn collection_request<'a>(&'a self, name: &'a str) -> CollectionRequest<'a> {
        CollectionRequest {
            collection_name: name,
            db_name: self.options.database.as_deref(),
        }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Value> {
        self.ensure_open()?;
        let url = format!("{}{path}", self.endpoint);
        debug!(operation, %url, "POST");

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.options.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| SmokeError::Transport {
            endpoint: url.clone(),
            source,
        })?;
        let text = read_body(&url, response).await?;
        parse_envelope(operation, &text)
    }
}

#[async_trait]
impl VectorStore for MilvusClient {
    fn alias(&self) -> &str {
        &self.options.alias
    }

    async fn server_version(&self) -> Result<String> {
        self.ensure_open()?;
        match &self.options.version_path {
            Some(path) => self.version_over_http(path).await,
            None => grpc::fetch_version(&self.options).await,
        }
    }

    async fn has_collection(&self, name: &str) -> Result<bool> {
        let envelope = self
            .post("has collection", HAS_COLLECTION, &self.collection_request(name))
            .await?;
        let data: HasData = decode_data(&envelope, "has collection")?;
        Ok(data.has)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.post("drop collection", DROP_COLLECTION, &self.collection_request(name))
            .await?;
        Ok(())
    }

    async fn create_collection(
        &self,
        name: &str,
        schema: &CollectionSchema,
    ) -> Result<Collection> {
        let body = CreateCollectionRequest::new(name, self.options.database.as_deref(), schema);
        self.post("create collection", CREATE_COLLECTION, &body)
            .await?;
        Ok(Collection {
            name: name.to_string(),
            schema: schema.clone(),
        })
    }

    async fn insert(&self, collection: &str, rows: &[SampleRecord]) -> Result<InsertResult> {
        let body = InsertRequest {
            collection_name: collection,
            db_name: self.options.database.as_deref(),
            data: rows,
        };
        let envelope = self.post("insert", INSERT_ENTITIES, &body).await?;
        let data: InsertData = decode_data(&envelope, "insert")?;
        Ok(InsertResult {
            insert_count: data.insert_count,
        })
    }

    async fn create_index(
        &self,
        collection: &str,
        field: &str,
        params: &IndexParams,
    ) -> Result<()> {
        let body = CreateIndexRequest::new(collection, self.options.database.as_deref(), field, params);
        self.post("create index", CREATE_INDEX, &body).await?;
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<()> {
        self.post("load collection", LOAD_COLLECTION, &self.collection_request(collection))
            .await?;
        Ok(())
    }

    async fn load_state(&self, collection: &str) -> Result<LoadState> {
        let envelope = self
            .post("get load state", GET_LOAD_STATE, &self.collection_request(collection))
            .await?;
        let data: LoadStateData = decode_data(&envelope, "get load state")?;
        data.into_load_state()
    }

    async fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<ResultSet>> {
        let body = SearchBody::new(collection, self.options.database.as_deref(), request);
        let envelope = self.post("search", SEARCH_ENTITIES, &body).await?;
        parse_search_response(&envelope, request.vectors.len(), request.limit)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        info!(alias = %self.options.alias, "Disconnected");
        Ok(())
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    db_name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionRequest<'a> {
    collection_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCollectionRequest<'a> {
    collection_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_name: Option<&'a str>,
    description: &'a str,
    schema: WireSchema<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSchema<'a> {
    auto_id: bool,
    enable_dynamic_field: bool,
    fields: Vec<WireField<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireField<'a> {
    field_name: &'a str,
    data_type: &'static str,
    is_primary: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    element_type_params: BTreeMap<&'static str, String>,
}

impl<'a> CreateCollectionRequest<'a> {
    fn new(name: &'a str, db_name: Option<&'a str>, schema: &'a CollectionSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|field| {
                let mut element_type_params = BTreeMap::new();
                if let Some(dim) = field.dim {
                    element_type_params.insert("dim", dim.to_string());
                }
                WireField {
                    field_name: &field.name,
                    data_type: field.data_type.as_str(),
                    is_primary: field.is_primary,
                    element_type_params,
                }
            })
            .collect();

        Self {
            collection_name: name,
            db_name,
            description: &schema.description,
            schema: WireSchema {
                auto_id: schema.primary_field().is_some_and(|f| f.auto_id),
                enable_dynamic_field: false,
                fields,
            },
        }
    }
}

/// Rows are sent as `{"id": .., "vector": [..]}` objects, matching the
/// field names of [`CollectionSchema::id_and_vector`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRequest<'a> {
    collection_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_name: Option<&'a str>,
    data: &'a [SampleRecord],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexRequest<'a> {
    collection_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_name: Option<&'a str>,
    index_params: Vec<WireIndexParam<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireIndexParam<'a> {
    field_name: &'a str,
    index_name: &'a str,
    metric_type: &'static str,
    index_type: &'static str,
    params: BTreeMap<String, Value>,
}

impl<'a> CreateIndexRequest<'a> {
    fn new(
        collection: &'a str,
        db_name: Option<&'a str>,
        field: &'a str,
        params: &'a IndexParams,
    ) -> Self {
        let mut wire_params: BTreeMap<String, Value> = params
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        // Older servers read the index type from params, newer ones from the
        // top level.
        wire_params.insert(
            "index_type".to_string(),
            Value::from(params.index_type.as_str()),
        );

        Self {
            collection_name: collection,
            db_name,
            index_params: vec![WireIndexParam {
                field_name: field,
                index_name: field,
                metric_type: params.metric.as_str(),
                index_type: params.index_type.as_str(),
                params: wire_params,
            }],
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    collection_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    db_name: Option<&'a str>,
    data: &'a [Vec<f32>],
    anns_field: &'a str,
    limit: usize,
    search_params: WireSearchParams<'a>,
    #[serde(skip_serializing_if = "no_fields")]
    output_fields: &'a [String],
}

fn no_fields(fields: &&[String]) -> bool {
    fields.is_empty()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSearchParams<'a> {
    metric_type: &'static str,
    params: &'a BTreeMap<String, i64>,
}

impl<'a> SearchBody<'a> {
    fn new(collection: &'a str, db_name: Option<&'a str>, request: &'a SearchRequest) -> Self {
        Self {
            collection_name: collection,
            db_name,
            data: &request.vectors,
            anns_field: &request.anns_field,
            limit: request.limit,
            search_params: WireSearchParams {
                metric_type: request.metric.as_str(),
                params: &request.params,
            },
            output_fields: &request.output_fields,
        }
    }
}

#[derive(Deserialize)]
struct HasData {
    has: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertData {
    insert_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStateData {
    load_state: String,
    #[serde(default)]
    load_progress: Option<u8>,
}

impl LoadStateData {
    fn into_load_state(self) -> Result<LoadState> {
        match self.load_state.as_str() {
            "LoadStateNotExist" => Ok(LoadState::NotExist),
            "LoadStateNotLoad" => Ok(LoadState::NotLoad),
            "LoadStateLoading" => Ok(LoadState::Loading {
                progress: self.load_progress.unwrap_or(0),
            }),
            "LoadStateLoaded" => Ok(LoadState::Loaded),
            other => Err(SmokeError::malformed(
                "get load state",
                format!("unknown load state '{other}'"),
            )),
        }
    }
}

/// Milvus may render `Int64` primary keys as strings to protect precision.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Int(i64),
    Text(String),
}

#[derive(Deserialize)]
struct WireHit {
    id: WireId,
    distance: f32,
}

impl WireHit {
    fn into_hit(self) -> Result<SearchHit> {
        let id = match self.id {
            WireId::Int(id) => id,
            WireId::Text(text) => text.parse().map_err(|_| {
                SmokeError::malformed("search", format!("non-integer id '{text}'"))
            })?,
        };
        Ok(SearchHit {
            id,
            distance: self.distance,
        })
    }
}

// =============================================================================
// Response decoding
// =============================================================================

async fn read_body(url: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await.map_err(|source| SmokeError::Transport {
        endpoint: url.to_string(),
        source,
    })?;
    if !status.is_success() {
        return Err(SmokeError::HttpStatus {
            endpoint: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn transport_reason(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or host unreachable".to_string()
    } else if error.is_timeout() {
        "timed out".to_string()
    } else {
        error.to_string()
    }
}

/// Parse a response envelope, turning service rejections into errors.
///
/// # Errors
///
/// Returns [`SmokeError::MalformedResponse`] for non-JSON bodies and
/// [`SmokeError::Service`] when `code` signals failure.
pub fn parse_envelope(operation: &'static str, text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SmokeError::malformed(operation, e.to_string()))?;

    let code = value.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 && code != 200 {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message")
            .to_string();
        return Err(SmokeError::service(operation, code, message));
    }
    Ok(value)
}

fn decode_data<T: serde::de::DeserializeOwned>(envelope: &Value, operation: &'static str) -> Result<T> {
    let data = envelope
        .get("data")
        .cloned()
        .ok_or_else(|| SmokeError::malformed(operation, "missing 'data'"))?;
    serde_json::from_value(data).map_err(|e| SmokeError::malformed(operation, e.to_string()))
}

/// Extract the version string from a version response.
///
/// Accepts an envelope with `data.version`, a bare `{"version": ..}`
/// object, a JSON string, or plain text.
///
/// # Errors
///
/// Returns an error if the body is empty, a service rejection, or carries
/// no version.
pub fn parse_version(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SmokeError::malformed("get server version", "empty body"));
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Ok(trimmed.to_string());
    };
    if let Value::String(version) = value {
        return Ok(version);
    }

    let envelope = parse_envelope("get server version", trimmed)?;
    envelope
        .pointer("/data/version")
        .or_else(|| envelope.get("version"))
        .or_else(|| envelope.get("data").filter(|d| d.is_string()))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SmokeError::malformed("get server version", "no version field"))
}

/// Split a search response into one result set per query vector.
///
/// The v2 API returns all hits as one flat `data` list. Newer servers add
/// `topks` with the hit count per query; without it the hits of a single
/// query are taken as-is and multiple queries are split by `limit`.
///
/// # Errors
///
/// Returns [`SmokeError::MalformedResponse`] if `data` is missing or the
/// hits or `topks` do not decode.
pub fn parse_search_response(
    envelope: &Value,
    query_count: usize,
    limit: usize,
) -> Result<Vec<ResultSet>> {
    let raw: Vec<WireHit> = decode_data(envelope, "search")?;
    let hits = raw
        .into_iter()
        .map(WireHit::into_hit)
        .collect::<Result<Vec<_>>>()?;

    if let Some(topks) = envelope.get("topks") {
        let topks: Vec<usize> = serde_json::from_value(topks.clone())
            .map_err(|e| SmokeError::malformed("search", format!("bad topks: {e}")))?;
        if topks.iter().sum::<usize>() != hits.len() {
            return Err(SmokeError::malformed(
                "search",
                format!("topks sum to {} but {} hits returned", topks.iter().sum::<usize>(), hits.len()),
            ));
        }
        let mut rest = hits.as_slice();
        let mut sets = Vec::with_capacity(topks.len());
        for k in topks {
            let (head, tail) = rest.split_at(k);
            sets.push(head.to_vec());
            rest = tail;
        }
        return Ok(sets);
    }

    if query_count <= 1 {
        return Ok(vec![hits]);
    }
    Ok(hits.chunks(limit.max(1)).map(<[SearchHit]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IndexType, MetricType};
    use serde_json::json;

    #[test]
    fn envelope_success_codes() {
        assert!(parse_envelope("op", r#"{"code":0,"data":{}}"#).is_ok());
        assert!(parse_envelope("op", r#"{"code":200,"data":{}}"#).is_ok());
    }

    #[test]
    fn envelope_rejection_becomes_service_error() {
        let err = parse_envelope(
            "create collection",
            r#"{"code":1100,"message":"invalid parameter"}"#,
        )
        .unwrap_err();
        match err {
            SmokeError::Service {
                operation,
                code,
                message,
            } => {
                assert_eq!(operation, "create collection");
                assert_eq!(code, 1100);
                assert_eq!(message, "invalid parameter");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn envelope_rejects_non_json() {
        let err = parse_envelope("op", "<html>").unwrap_err();
        assert!(matches!(err, SmokeError::MalformedResponse { .. }));
    }

    #[test]
    fn create_collection_body_shape() {
        let schema = CollectionSchema::id_and_vector(128, "Simple test collection").unwrap();
        let body = serde_json::to_value(CreateCollectionRequest::new(
            "test_collection",
            None,
            &schema,
        ))
        .unwrap();

        assert_eq!(body["collectionName"], "test_collection");
        assert!(body.get("dbName").is_none());
        assert_eq!(body["description"], "Simple test collection");
        assert_eq!(body["schema"]["autoId"], false);
        assert_eq!(body["schema"]["fields"][0]["fieldName"], "id");
        assert_eq!(body["schema"]["fields"][0]["dataType"], "Int64");
        assert_eq!(body["schema"]["fields"][0]["isPrimary"], true);
        assert!(body["schema"]["fields"][0].get("elementTypeParams").is_none());
        assert_eq!(body["schema"]["fields"][1]["dataType"], "FloatVector");
        assert_eq!(body["schema"]["fields"][1]["elementTypeParams"]["dim"], "128");
    }

    #[test]
    fn insert_body_uses_row_objects() {
        let rows = vec![SampleRecord {
            id: 0,
            vector: vec![0.5, 0.25],
        }];
        let body = serde_json::to_value(InsertRequest {
            collection_name: "c",
            db_name: Some("analytics"),
            data: &rows,
        })
        .unwrap();
        assert_eq!(body["dbName"], "analytics");
        assert_eq!(body["data"][0], json!({"id": 0, "vector": [0.5, 0.25]}));
    }

    #[test]
    fn create_index_body_shape() {
        let params = IndexParams::new(MetricType::L2, IndexType::IvfFlat, 128);
        let body =
            serde_json::to_value(CreateIndexRequest::new("c", None, "vector", &params)).unwrap();
        let index = &body["indexParams"][0];
        assert_eq!(index["fieldName"], "vector");
        assert_eq!(index["metricType"], "L2");
        assert_eq!(index["indexType"], "IVF_FLAT");
        assert_eq!(index["params"]["nlist"], 128);
        assert_eq!(index["params"]["index_type"], "IVF_FLAT");
    }

    #[test]
    fn search_body_shape() {
        let request =
            SearchRequest::single(vec![0.1, 0.2], "vector", MetricType::L2, IndexType::IvfFlat, 10, 3);
        let body = serde_json::to_value(SearchBody::new("c", None, &request)).unwrap();
        assert_eq!(body["annsField"], "vector");
        assert_eq!(body["limit"], 3);
        assert_eq!(body["searchParams"]["metricType"], "L2");
        assert_eq!(body["searchParams"]["params"]["nprobe"], 10);
        assert!(body.get("outputFields").is_none());
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn search_response_single_query() {
        let envelope = json!({
            "code": 0,
            "data": [
                {"id": 0, "distance": 0.0},
                {"id": "7", "distance": 15.25},
                {"id": 3, "distance": 16.5}
            ]
        });
        let sets = parse_search_response(&envelope, 1, 3).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0][0], SearchHit { id: 0, distance: 0.0 });
        assert_eq!(sets[0][1].id, 7);
    }

    #[test]
    fn search_response_split_by_topks() {
        let envelope = json!({
            "code": 0,
            "data": [
                {"id": 1, "distance": 0.0},
                {"id": 2, "distance": 0.0},
                {"id": 5, "distance": 1.0}
            ],
            "topks": [1, 2]
        });
        let sets = parse_search_response(&envelope, 2, 2).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 1);
        assert_eq!(sets[1].len(), 2);
    }

    #[test]
    fn search_response_rejects_inconsistent_topks() {
        let envelope = json!({"code": 0, "data": [{"id": 1, "distance": 0.0}], "topks": [2]});
        assert!(parse_search_response(&envelope, 1, 2).is_err());
    }

    #[test]
    fn search_response_rejects_bad_id() {
        let envelope = json!({"code": 0, "data": [{"id": "abc", "distance": 0.0}]});
        assert!(parse_search_response(&envelope, 1, 3).is_err());
    }

    #[test]
    fn load_state_mapping() {
        let loading = LoadStateData {
            load_state: "LoadStateLoading".into(),
            load_progress: Some(40),
        };
        assert_eq!(loading.into_load_state().unwrap(), LoadState::Loading { progress: 40 });

        let loaded = LoadStateData {
            load_state: "LoadStateLoaded".into(),
            load_progress: None,
        };
        assert!(loaded.into_load_state().unwrap().is_loaded());

        let unknown = LoadStateData {
            load_state: "Mystery".into(),
            load_progress: None,
        };
        assert!(unknown.into_load_state().is_err());
    }

    #[test]
    fn version_parsing_variants() {
        assert_eq!(
            parse_version(r#"{"code":0,"data":{"version":"v2.4.5"}}"#).unwrap(),
            "v2.4.5"
        );
        assert_eq!(parse_version(r#"{"version":"2.5.0"}"#).unwrap(), "2.5.0");
        assert_eq!(parse_version(r#""v2.3.1""#).unwrap(), "v2.3.1");
        assert_eq!(parse_version("v2.4.0\n").unwrap(), "v2.4.0");
        assert!(parse_version("").is_err());
        assert!(parse_version(r#"{"code":0,"data":{}}"#).is_err());
        assert!(parse_version(r#"{"code":5,"message":"nope"}"#).is_err());
    }
}
