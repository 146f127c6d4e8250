//! CLI definitions for milvus-smoke.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::logging::LogFormat;
use crate::model::{IndexType, MetricType};

/// milvus-smoke - end-to-end smoke test for a Milvus deployment
#[derive(Parser, Debug)]
#[command(name = "milvus-smoke")]
#[command(version)]
#[command(about = "End-to-end smoke test for a Milvus vector database")]
#[command(long_about = r#"
milvus-smoke connects to a Milvus service and exercises it end to end:

  1. Connect and report the server version
  2. Drop any leftover test collection and create it fresh
  3. Insert random sample vectors
  4. Build a vector index and load the collection
  5. Search with a known vector and check the nearest hit
  6. Disconnect

The exit code is non-zero if any step fails, so it can gate deployments.

Quick start:
  milvus-smoke                          # localhost:19530, classic defaults
  milvus-smoke run --host db --seed 42  # reproducible run against 'db'
  milvus-smoke --format json run        # machine-readable report
"#)]
pub struct Cli {
    /// Configuration file (default: ~/.config/milvus-smoke/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Be verbose (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Be quiet (suppress progress output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the smoke test (the default command)
    Run(RunArgs),

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Service host
    #[arg(long)]
    pub host: Option<String>,

    /// Service port
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Connection alias
    #[arg(long)]
    pub alias: Option<String>,

    /// Bearer token (user:password or API key)
    #[arg(long)]
    pub token: Option<String>,

    /// Database name
    #[arg(long)]
    pub db: Option<String>,

    /// Connect over HTTPS
    #[arg(long)]
    pub secure: bool,

    /// Read the server version from this HTTP path instead of gRPC
    #[arg(long, value_name = "PATH")]
    pub version_path: Option<String>,

    /// Collection to create (dropped first if it exists)
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Vector dimension
    #[arg(long)]
    pub dim: Option<usize>,

    /// Number of sample vectors to insert
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Seed for the sample vectors
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of hits to request
    #[arg(long, short = 'k')]
    pub limit: Option<usize>,

    /// IVF clusters probed per search
    #[arg(long)]
    pub nprobe: Option<u32>,

    /// IVF cluster count
    #[arg(long)]
    pub nlist: Option<u32>,

    /// Distance metric (L2, IP, COSINE)
    #[arg(long)]
    pub metric: Option<MetricType>,

    /// Index type (FLAT, IVF_FLAT, IVF_SQ8, AUTOINDEX)
    #[arg(long)]
    pub index_type: Option<IndexType>,

    /// Report verification mismatches as warnings instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Drop the collection after a successful search
    #[arg(long)]
    pub drop_after: bool,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// How long to wait for the collection to load
    #[arg(long)]
    pub load_timeout_secs: Option<u64>,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        let connection = &mut config.connection;
        if let Some(host) = &self.host {
            connection.host.clone_from(host);
        }
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(alias) = &self.alias {
            connection.alias.clone_from(alias);
        }
        if let Some(token) = &self.token {
            connection.token = Some(token.clone());
        }
        if let Some(db) = &self.db {
            connection.database = Some(db.clone());
        }
        if self.secure {
            connection.secure = true;
        }
        if let Some(secs) = self.timeout_secs {
            connection.request_timeout_secs = secs;
        }
        if let Some(path) = &self.version_path {
            connection.version_path = Some(path.clone());
        }
        if let Some(name) = &self.collection {
            config.collection.name.clone_from(name);
        }
        if let Some(dim) = self.dim {
            config.collection.dimension = dim;
        }
        if let Some(count) = self.count {
            config.data.count = count;
        }
        if let Some(seed) = self.seed {
            config.data.seed = Some(seed);
        }
        if let Some(limit) = self.limit {
            config.search.limit = limit;
        }
        if let Some(nprobe) = self.nprobe {
            config.search.nprobe = nprobe;
        }
        if let Some(nlist) = self.nlist {
            config.index.nlist = nlist;
        }
        if let Some(metric) = self.metric {
            config.index.metric = metric;
        }
        if let Some(index_type) = self.index_type {
            config.index.index_type = index_type;
        }
        if self.lenient {
            config.verify.strict = false;
        }
        if self.drop_after {
            config.verify.drop_after = true;
        }
        if let Some(secs) = self.load_timeout_secs {
            config.load.timeout_secs = secs;
        }
    }
}

#[derive(Args, Debug)]
#[command(group = clap::ArgGroup::new("action").multiple(false))]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(long, group = "action")]
    pub show: bool,

    /// Print one setting, e.g. connection.host
    #[arg(long, group = "action", value_name = "KEY")]
    pub get: Option<String>,

    /// Write the default configuration file
    #[arg(long, group = "action")]
    pub init: bool,

    /// Overwrite an existing file with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

impl OutputFormat {
    pub const NAMES: &'static [&'static str] = &["text", "json", "json-pretty"];

    /// Parse a format name from configuration.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_str(name, true).ok()
    }
}
