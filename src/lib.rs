//! milvus-smoke - end-to-end smoke test for a Milvus deployment
//!
//! The library drives one verification run against a vector database:
//! connect, report the server version, recreate a test collection, insert
//! random vectors, build an index, load, search with a known vector, and
//! disconnect. Each step is timed and recorded in a [`RunReport`].
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`client`] - The `Connector`/`VectorStore` contract the runner talks to
//! - [`config`] - Layered configuration (defaults, file, env, flags)
//! - [`error`] - Error taxonomy with categories and suggestions
//! - [`grpc`] - Server version over the Milvus gRPC service
//! - [`milvus`] - Milvus REST v2 client
//! - [`model`] - Schema, index and search types
//! - [`runner`] - The step sequence and its verification checks

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod grpc;
pub mod logging;
pub mod milvus;
pub mod model;
pub mod perf;
pub mod report;
pub mod runner;
pub mod sample;

pub use cli::{Cli, Commands, OutputFormat, RunArgs};
pub use client::{ConnectOptions, Connector, VectorStore};
pub use config::{Config, VALID_CONFIG_KEYS};
pub use error::{
    ErrorCategory, Result, SmokeError, find_closest_match, format_error,
    format_unknown_value_error,
};
pub use milvus::{MilvusClient, MilvusConnector};
pub use model::*;
pub use report::{RunReport, Step, StepReport, StepStatus};
pub use runner::{RunOutcome, RunPlan, SilentObserver, StepObserver, VerificationRunner};
pub use sample::generate_samples;
