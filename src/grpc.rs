//! Server version over gRPC.
//!
//! The REST v2 API has no version route. The proxy port also serves the
//! Milvus gRPC service, and `MilvusService.GetVersion` answers there on
//! every 2.x release, so the version is read from it unless an HTTP path
//! is configured.
//!
//! Only the messages this call needs are declared, with the field tags of
//! `milvus.proto`. Unknown fields in replies are skipped.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

use crate::client::ConnectOptions;
use crate::error::{Result, SmokeError};

/// Full method path of `MilvusService.GetVersion`.
pub const GET_VERSION: &str = "/milvus.proto.milvus.MilvusService/GetVersion";

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct GetVersionRequest {}

/// `common.Status`, reduced to the fields that carry the outcome.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct RpcStatus {
    /// Legacy error enum. Zero is success.
    #[prost(int32, tag = "1")]
    pub error_code: i32,
    #[prost(string, tag = "2")]
    pub reason: String,
    #[prost(int32, tag = "3")]
    pub code: i32,
}

#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct GetVersionResponse {
    #[prost(message, optional, tag = "1")]
    pub status: Option<RpcStatus>,
    #[prost(string, tag = "2")]
    pub version: String,
}

impl GetVersionResponse {
    /// The version string, or the rejection carried in `status`.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::Service`] for a non-zero status and
    /// [`SmokeError::MalformedResponse`] for an empty version.
    pub fn into_version(self) -> Result<String> {
        if let Some(status) = self.status {
            let code = if status.code == 0 {
                status.error_code
            } else {
                status.code
            };
            if code != 0 {
                return Err(SmokeError::service(
                    "get server version",
                    i64::from(code),
                    status.reason,
                ));
            }
        }
        if self.version.is_empty() {
            return Err(SmokeError::malformed("get server version", "empty version"));
        }
        Ok(self.version)
    }
}

/// Ask the proxy for its version with `MilvusService.GetVersion`.
///
/// The token travels base64-encoded in the `authorization` metadata and
/// the database in `dbname`, the way Milvus SDKs send them.
///
/// # Errors
///
/// Returns [`SmokeError::Unreachable`] if no channel can be opened,
/// [`SmokeError::Rpc`] if the call fails, and the errors of
/// [`GetVersionResponse::into_version`] for a rejected reply.
pub async fn fetch_version(options: &ConnectOptions) -> Result<String> {
    let endpoint = options.endpoint();
    let channel = open_channel(options).await?;
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.map_err(|e| SmokeError::Unreachable {
        endpoint: endpoint.clone(),
        reason: describe(&e),
    })?;

    let mut request = tonic::Request::new(GetVersionRequest {});
    if let Some(token) = &options.token {
        insert_metadata(&mut request, "authorization", &STANDARD.encode(token), "connection.token")?;
    }
    if let Some(database) = &options.database {
        insert_metadata(&mut request, "dbname", database, "connection.database")?;
    }

    debug!(%endpoint, method = GET_VERSION, "gRPC");
    let codec: ProstCodec<GetVersionRequest, GetVersionResponse> = ProstCodec::default();
    let response = grpc
        .unary(request, PathAndQuery::from_static(GET_VERSION), codec)
        .await
        .map_err(|status| SmokeError::Rpc {
            endpoint: format!("{endpoint}{GET_VERSION}"),
            code: status.code(),
            message: status.message().to_string(),
        })?;
    response.into_inner().into_version()
}

async fn open_channel(options: &ConnectOptions) -> Result<Channel> {
    let url = options.endpoint();
    let unreachable = |reason: String| SmokeError::Unreachable {
        endpoint: url.clone(),
        reason,
    };

    let mut endpoint = Endpoint::from_shared(url.clone()).map_err(|e| unreachable(describe(&e)))?;
    if let Some(timeout) = options.request_timeout {
        endpoint = endpoint.timeout(timeout).connect_timeout(timeout);
    }
    if options.secure {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(|e| unreachable(describe(&e)))?;
    }
    endpoint.connect().await.map_err(|e| unreachable(describe(&e)))
}

fn insert_metadata(
    request: &mut tonic::Request<GetVersionRequest>,
    key: &'static str,
    value: &str,
    setting: &'static str,
) -> Result<()> {
    let value = MetadataValue::try_from(value)
        .map_err(|e| SmokeError::invalid_setting(setting, e.to_string()))?;
    request.metadata_mut().insert(key, value);
    Ok(())
}

/// Transport errors only say "transport error" at the top; the cause is
/// further down the chain.
fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
