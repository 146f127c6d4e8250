//! Custom error types for milvus-smoke.
//!
//! Every failure a verification run can hit maps onto one variant of
//! [`SmokeError`], and every variant belongs to one [`ErrorCategory`] so the
//! runner can decide what is fatal and the CLI can explain what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Broad class of a failure, used for reporting and exit behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Connectivity,
    Schema,
    Data,
    Query,
    Service,
    Config,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connectivity => "connectivity",
            Self::Schema => "schema",
            Self::Data => "data",
            Self::Query => "query",
            Self::Service => "service",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

/// Primary error type for milvus-smoke operations.
#[derive(Error, Debug)]
pub enum SmokeError {
    // =========================================================================
    // Connectivity Errors
    // =========================================================================
    /// The service could not be reached at all.
    #[error("Cannot reach vector database at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// A request was sent but the transport failed mid-flight.
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status} from {endpoint}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// A gRPC call failed with a non-OK status.
    #[error("gRPC call {endpoint} failed ({code:?}): {message}")]
    Rpc {
        endpoint: String,
        code: tonic::Code,
        message: String,
    },

    /// The connection was already released.
    #[error("Connection '{alias}' is closed")]
    Disconnected { alias: String },

    // =========================================================================
    // Service Errors
    // =========================================================================
    /// The service rejected the request (non-zero envelope code).
    #[error("Service rejected {operation} (code {code}): {message}")]
    Service {
        operation: &'static str,
        code: i64,
        message: String,
    },

    /// The service answered with a body we could not decode.
    #[error("Malformed response to {operation}: {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },

    /// The collection did not reach the loaded state in time.
    #[error("Collection '{collection}' not loaded after {waited_secs}s (last state: {state})")]
    LoadTimeout {
        collection: String,
        waited_secs: u64,
        state: String,
    },

    /// The collection vanished while the run was using it.
    #[error("Collection '{collection}' does not exist")]
    CollectionMissing { collection: String },

    // =========================================================================
    // Schema Errors
    // =========================================================================
    /// A field definition is invalid.
    #[error("Invalid schema: {reason}")]
    InvalidSchema { reason: String },

    /// A vector does not match the dimension declared by the schema.
    #[error("Vector for id {id} has dimension {actual}, schema declares {expected}")]
    DimensionMismatch {
        id: i64,
        expected: usize,
        actual: usize,
    },

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// The service acknowledged a different number of rows than were sent.
    #[error("Inserted {actual} entities, expected {expected}")]
    InsertCountMismatch { expected: usize, actual: usize },

    // =========================================================================
    // Query Errors
    // =========================================================================
    /// The search returned no hits.
    #[error("Search returned no results")]
    EmptyResult,

    /// The search returned more hits than were requested.
    #[error("Search returned {actual} hits, limit was {limit}")]
    TooManyResults { limit: usize, actual: usize },

    /// The nearest neighbor was not the record used as the query.
    #[error("Top hit is id {actual}, expected id {expected}")]
    UnexpectedTopHit { expected: i64, actual: i64 },

    /// The nearest neighbor's distance is off the exact-match value.
    #[error("Top hit distance {distance} is not within {tolerance} of {expected}")]
    DistanceOutOfTolerance {
        distance: f32,
        expected: f32,
        tolerance: f32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    /// Environment variable error.
    #[error("Invalid environment variable {var}: {reason}")]
    EnvVarError { var: String, reason: String },

    /// A configuration value is out of range.
    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    /// File read/write error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for milvus-smoke operations.
pub type Result<T> = std::result::Result<T, SmokeError>;

impl SmokeError {
    /// Create a service rejection error.
    pub fn service(operation: &'static str, code: i64, message: impl Into<String>) -> Self {
        Self::Service {
            operation,
            code,
            message: message.into(),
        }
    }

    /// Create a malformed response error.
    pub fn malformed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation,
            reason: reason.into(),
        }
    }

    /// Create an invalid schema error.
    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            reason: reason.into(),
        }
    }

    /// Create an invalid setting error.
    pub fn invalid_setting(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }

    /// The category this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Unreachable { .. }
            | Self::Transport { .. }
            | Self::HttpStatus { .. }
            | Self::Rpc { .. }
            | Self::Disconnected { .. } => ErrorCategory::Connectivity,
            Self::Service { .. }
            | Self::MalformedResponse { .. }
            | Self::LoadTimeout { .. }
            | Self::CollectionMissing { .. } => ErrorCategory::Service,
            Self::InvalidSchema { .. } | Self::DimensionMismatch { .. } => ErrorCategory::Schema,
            Self::InsertCountMismatch { .. } => ErrorCategory::Data,
            Self::EmptyResult
            | Self::TooManyResults { .. }
            | Self::UnexpectedTopHit { .. }
            | Self::DistanceOutOfTolerance { .. } => ErrorCategory::Query,
            Self::ConfigError { .. }
            | Self::EnvVarError { .. }
            | Self::InvalidSetting { .. }
            | Self::IoError(_) => ErrorCategory::Config,
        }
    }

    /// Whether this error is a verification finding rather than an
    /// operational failure. Lenient runs downgrade these to warnings.
    #[must_use]
    pub const fn is_verification_finding(&self) -> bool {
        matches!(
            self,
            Self::InsertCountMismatch { .. }
                | Self::EmptyResult
                | Self::TooManyResults { .. }
                | Self::UnexpectedTopHit { .. }
                | Self::DistanceOutOfTolerance { .. }
        )
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Unreachable { .. } | Self::Transport { .. } => Some(
                "Check that Milvus is running and that --host/--port point at its proxy (default 19530).",
            ),
            Self::HttpStatus { status: 401 | 403, .. }
            | Self::Rpc {
                code: tonic::Code::Unauthenticated,
                ..
            } => Some(TOKEN_HINT),
            Self::Service { code, .. } if *code == AUTH_REQUIRED_CODE => Some(TOKEN_HINT),
            Self::Service { code, .. } if *code == PERMISSION_DENIED_CODE => {
                Some("The token's user lacks a privilege this run needs. Use a user with admin rights.")
            }
            Self::HttpStatus {
                status: 404,
                endpoint,
                ..
            } => {
                if endpoint.contains(REST_V2_PREFIX) {
                    Some("The v2 REST API is missing. Milvus 2.4 or newer is required.")
                } else {
                    Some(
                        "Nothing is served at this path. Fix --version-path, or unset it to read the version over gRPC.",
                    )
                }
            }
            Self::Rpc { .. } => Some(
                "The server did not answer gRPC GetVersion on this port. Pass --version-path to read the version over HTTP.",
            ),
            Self::LoadTimeout { .. } => Some(
                "Raise --load-timeout-secs, or check query node resources on the server.",
            ),
            Self::DimensionMismatch { .. } | Self::InvalidSchema { .. } => {
                Some("Check collection.dimension against the sample data settings.")
            }
            Self::ConfigError { .. } => {
                Some("Run 'milvus-smoke config --init' to write a fresh default config.")
            }
            Self::InsertCountMismatch { .. }
            | Self::UnexpectedTopHit { .. }
            | Self::DistanceOutOfTolerance { .. } => {
                Some("Re-run with --lenient to observe results without failing the run.")
            }
            _ => None,
        }
    }
}

const TOKEN_HINT: &str =
    "The service requires authentication. Pass --token or set MILVUS_SMOKE_TOKEN.";

/// Milvus service code for an unauthenticated request.
const AUTH_REQUIRED_CODE: i64 = 1800;

/// Milvus service code for a request the user has no privilege for.
const PERMISSION_DENIED_CODE: i64 = 1801;

const REST_V2_PREFIX: &str = "/v2/vectordb/";

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
///
/// # Arguments
/// * `title` - Brief error title (e.g., "Search failed")
/// * `explanation` - What went wrong and why
/// * `suggestions` - List of actionable suggestions
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}

/// Calculate the Levenshtein edit distance between two strings.
///
/// Used for "did you mean?" suggestions on config keys.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// Find the closest candidate within `max_distance` edits (default 2).
///
/// Exact matches are not returned; they need no suggestion.
#[must_use]
pub fn find_closest_match<'a>(
    input: &str,
    candidates: &[&'a str],
    max_distance: Option<usize>,
) -> Option<&'a str> {
    let max_dist = max_distance.unwrap_or(2);
    let input_lower = input.to_lowercase();

    candidates
        .iter()
        .map(|&candidate| {
            let distance = levenshtein_distance(&input_lower, &candidate.to_lowercase());
            (candidate, distance)
        })
        .filter(|(_, distance)| *distance <= max_dist && *distance > 0)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Format an error for an unknown value with "did you mean?" support.
#[must_use]
pub fn format_unknown_value_error(kind: &str, input: &str, valid_options: &[&str]) -> String {
    let title = format!("Unknown {kind}: '{input}'");

    let mut suggestions = Vec::new();

    if let Some(closest) = find_closest_match(input, valid_options, None) {
        suggestions.push(format!("Did you mean '{}'?", closest.green()));
    }

    if valid_options.len() <= 8 {
        suggestions.push(format!("Valid {kind}s: {}", valid_options.join(", ")));
    }

    let suggestion_refs: Vec<&str> = suggestions.iter().map(String::as_str).collect();
    format_error(&title, "", &suggestion_refs)
}
