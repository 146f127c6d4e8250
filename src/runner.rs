//! The verification runner.
//!
//! Runs the fixed sequence connect → version → prepare collection → insert →
//! build index → load → search → (drop) → disconnect against one
//! [`VectorStore`], stopping at the first fatal failure. Disconnect is
//! attempted whenever a connection was opened, and never fails the run.

use std::fmt::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::client::{ConnectOptions, Connector, VectorStore};
use crate::error::{ErrorCategory, Result, SmokeError};
use crate::model::{
    CollectionSchema, IndexParams, IndexType, LoadState, MetricType, SampleRecord, SearchHit,
    SearchRequest,
};
use crate::perf::{Timer, budget_for};
use crate::report::{Failure, RunReport, Step, StepReport, StepStatus};
use crate::sample::generate_samples;

/// Everything a run needs to know. Defaults reproduce the classic smoke
/// test: 10 random 128-d vectors, IVF_FLAT/L2 with nlist 128, top-3 search
/// with nprobe 10 using the vector of record 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub connect: ConnectOptions,
    pub collection: String,
    pub description: String,
    pub dimension: usize,
    pub count: usize,
    pub seed: Option<u64>,
    pub metric: MetricType,
    pub index_type: IndexType,
    pub nlist: u32,
    pub nprobe: u32,
    pub limit: usize,
    pub query_id: i64,
    pub distance_tolerance: f32,
    pub load_timeout: Duration,
    pub load_poll_interval: Duration,
    pub strict: bool,
    pub drop_after: bool,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            connect: ConnectOptions::default(),
            collection: "test_collection".to_string(),
            description: "Simple test collection".to_string(),
            dimension: 128,
            count: 10,
            seed: None,
            metric: MetricType::L2,
            index_type: IndexType::IvfFlat,
            nlist: 128,
            nprobe: 10,
            limit: 3,
            query_id: 0,
            distance_tolerance: 1e-6,
            load_timeout: Duration::from_secs(60),
            load_poll_interval: Duration::from_millis(500),
            strict: true,
            drop_after: false,
        }
    }
}

impl RunPlan {
    /// Reject plans that cannot produce a meaningful run.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::InvalidSetting`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(SmokeError::invalid_setting("collection.name", "must not be empty"));
        }
        if self.dimension == 0 {
            return Err(SmokeError::invalid_setting("collection.dimension", "must be > 0"));
        }
        if self.count == 0 {
            return Err(SmokeError::invalid_setting("data.count", "must be > 0"));
        }
        if self.limit == 0 {
            return Err(SmokeError::invalid_setting("search.limit", "must be > 0"));
        }
        if self.index_type.is_ivf() && self.nlist == 0 {
            return Err(SmokeError::invalid_setting("index.nlist", "must be > 0"));
        }
        if self.index_type.is_ivf() && self.nprobe == 0 {
            return Err(SmokeError::invalid_setting("search.nprobe", "must be > 0"));
        }
        let in_range = usize::try_from(self.query_id).is_ok_and(|id| id < self.count);
        if !in_range {
            return Err(SmokeError::invalid_setting(
                "search.query_id",
                format!("must be in 0..{}", self.count),
            ));
        }
        if self.distance_tolerance.is_nan() || self.distance_tolerance < 0.0 {
            return Err(SmokeError::invalid_setting(
                "search.distance_tolerance",
                "must be a non-negative number",
            ));
        }
        if self.load_poll_interval.is_zero() {
            return Err(SmokeError::invalid_setting("load.poll_interval_ms", "must be > 0"));
        }
        if let Some(path) = &self.connect.version_path {
            if !path.starts_with('/') {
                return Err(SmokeError::invalid_setting(
                    "connection.version_path",
                    format!("'{path}' must start with '/'"),
                ));
            }
        }
        Ok(())
    }
}

/// Receives step progress as the run advances.
pub trait StepObserver: Send + Sync {
    fn step_started(&self, _step: Step) {}
    fn step_finished(&self, _report: &StepReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl StepObserver for SilentObserver {}

/// Report of a finished run plus the fatal error, if any.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub error: Option<SmokeError>,
}

impl RunOutcome {
    /// Turn a failed run into its error.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the run.
    pub fn into_result(self) -> Result<RunReport> {
        match self.error {
            None => Ok(self.report),
            Some(error) => Err(error),
        }
    }
}

struct StepTimer {
    step: Step,
    timer: Timer,
}

struct Fatal {
    step: Step,
    error: SmokeError,
}

/// Drives one verification run.
pub struct VerificationRunner<C: Connector> {
    connector: C,
    plan: RunPlan,
    schema: CollectionSchema,
    observer: Box<dyn StepObserver>,
}

impl<C: Connector> VerificationRunner<C> {
    /// Build a runner for a validated plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan is invalid.
    pub fn new(connector: C, plan: RunPlan) -> Result<Self> {
        plan.validate()?;
        let schema = CollectionSchema::id_and_vector(plan.dimension, plan.description.clone())?;
        Ok(Self {
            connector,
            plan,
            schema,
            observer: Box::new(SilentObserver),
        })
    }

    /// Send step progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: impl StepObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    #[must_use]
    pub const fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Execute the run.
    pub async fn run(&self) -> RunOutcome {
        let plan = &self.plan;
        let mut report = RunReport::new(
            &plan.connect.alias,
            &plan.connect.endpoint(),
            &plan.collection,
            plan.strict,
        );
        info!(
            endpoint = %report.endpoint,
            collection = %plan.collection,
            strict = plan.strict,
            "Starting verification run"
        );

        let timer = self.begin(Step::Connect);
        let mut store = match self.connector.connect(&plan.connect).await {
            Ok(store) => {
                self.pass(
                    &mut report,
                    timer,
                    format!("Connected to {} as '{}'", plan.connect.endpoint(), store.alias()),
                );
                store
            }
            Err(error) => {
                let fatal = self.fail(&mut report, timer, error);
                return Self::finish(report, Some(fatal));
            }
        };

        let samples = generate_samples(plan.count, plan.dimension, plan.seed);
        let fatal = self.execute(&store, &mut report, &samples).await.err();

        self.disconnect(&mut store, &mut report).await;
        Self::finish(report, fatal)
    }

    fn finish(mut report: RunReport, fatal: Option<Fatal>) -> RunOutcome {
        let error = fatal.map(|fatal| {
            report.failure = Some(Failure {
                step: fatal.step,
                category: failure_category(fatal.step, &fatal.error),
                message: fatal.error.to_string(),
            });
            fatal.error
        });
        if error.is_none() {
            info!(total_ms = report.total_ms(), "Verification run passed");
        }
        RunOutcome { report, error }
    }

    async fn execute(
        &self,
        store: &C::Store,
        report: &mut RunReport,
        samples: &[SampleRecord],
    ) -> std::result::Result<(), Fatal> {
        let plan = &self.plan;
        let name = plan.collection.as_str();

        // Server version
        let timer = self.begin(Step::ServerVersion);
        let version = match store.server_version().await {
            Ok(version) => version,
            Err(error) => return Err(self.fail(report, timer, error)),
        };
        self.pass(report, timer, format!("Server version: {version}"));
        report.server_version = Some(version);

        // Clean collection
        let timer = self.begin(Step::PrepareCollection);
        let dropped = match self.prepare_collection(store).await {
            Ok(dropped) => dropped,
            Err(error) => return Err(self.fail(report, timer, error)),
        };
        let message = if dropped {
            format!("Dropped stale '{name}' and created it fresh")
        } else {
            format!("Collection '{name}' created successfully")
        };
        self.pass(report, timer, message);

        // Insert
        let timer = self.begin(Step::Insert);
        if let Err(error) = self.schema.check_records(samples) {
            return Err(self.fail(report, timer, error));
        }
        let inserted = match store.insert(name, samples).await {
            Ok(result) => result.insert_count,
            Err(error) => return Err(self.fail(report, timer, error)),
        };
        report.inserted = Some(inserted);
        let mut findings = Vec::new();
        if inserted != samples.len() {
            findings.push(SmokeError::InsertCountMismatch {
                expected: samples.len(),
                actual: inserted,
            });
        }
        self.verify(report, timer, findings, format!("Inserted {inserted} entities"))?;

        // Index
        let timer = self.begin(Step::BuildIndex);
        let field = self.vector_field();
        let params = IndexParams::new(plan.metric, plan.index_type, plan.nlist);
        if let Err(error) = store.create_index(name, field, &params).await {
            return Err(self.fail(report, timer, error));
        }
        let mut message = format!("Index created ({}, {}", params.index_type, params.metric);
        for (key, value) in &params.params {
            let _ = write!(message, ", {key}={value}");
        }
        message.push(')');
        self.pass(report, timer, message);

        // Load
        let timer = self.begin(Step::Load);
        let polls = match self.load_and_wait(store).await {
            Ok(polls) => polls,
            Err(error) => return Err(self.fail(report, timer, error)),
        };
        self.pass(report, timer, format!("Collection loaded ({polls} state check(s))"));

        // Search
        let timer = self.begin(Step::Search);
        let Some(query) = samples.iter().find(|r| r.id == plan.query_id) else {
            let error = SmokeError::invalid_setting("search.query_id", "no such sample record");
            return Err(self.fail(report, timer, error));
        };
        let request = SearchRequest::single(
            query.vector.clone(),
            field,
            plan.metric,
            plan.index_type,
            plan.nprobe,
            plan.limit,
        );
        let results = match store.search(name, &request).await {
            Ok(results) => results,
            Err(error) => return Err(self.fail(report, timer, error)),
        };
        let hits = results.into_iter().next().unwrap_or_default();
        report.top_hit = hits.first().copied();
        let findings = self.check_hits(&hits);
        let message = match hits.first() {
            Some(top) => format!(
                "{} hit(s), top id {} at distance {}",
                hits.len(),
                top.id,
                top.distance
            ),
            None => "no hits".to_string(),
        };
        self.verify(report, timer, findings, message)?;

        if plan.drop_after {
            let timer = self.begin(Step::Cleanup);
            match store.drop_collection(name).await {
                Ok(()) => self.pass(report, timer, format!("Dropped '{name}'")),
                Err(error) => {
                    warn!(%error, "Cleanup failed");
                    self.warn(report, timer, error.to_string(), None);
                }
            }
        }

        Ok(())
    }

    /// Drop any leftover collection and create it fresh. Returns whether a
    /// stale collection was dropped.
    async fn prepare_collection(&self, store: &C::Store) -> Result<bool> {
        let name = self.plan.collection.as_str();
        let existed = store.has_collection(name).await?;
        if existed {
            info!(collection = name, "Dropping existing collection");
            store.drop_collection(name).await?;
        }
        let collection = store.create_collection(name, &self.schema).await?;
        debug!(
            collection = %collection.name,
            fields = collection.schema.fields.len(),
            "Collection created"
        );
        Ok(existed)
    }

    /// Request a load and poll until the service reports it loaded.
    /// Returns the number of state checks made.
    async fn load_and_wait(&self, store: &C::Store) -> Result<u32> {
        let name = self.plan.collection.as_str();
        store.load(name).await?;

        let started = Instant::now();
        let mut polls = 0_u32;
        loop {
            let state = store.load_state(name).await?;
            polls += 1;
            debug!(collection = name, %state, polls, "Load state");
            match state {
                LoadState::Loaded => return Ok(polls),
                LoadState::NotExist => {
                    return Err(SmokeError::CollectionMissing {
                        collection: name.to_string(),
                    });
                }
                LoadState::NotLoad | LoadState::Loading { .. } => {}
            }
            if started.elapsed() >= self.plan.load_timeout {
                return Err(SmokeError::LoadTimeout {
                    collection: name.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                    state: state.to_string(),
                });
            }
            tokio::time::sleep(self.plan.load_poll_interval).await;
        }
    }

    /// Findings about the search result that strict mode treats as fatal.
    fn check_hits(&self, hits: &[SearchHit]) -> Vec<SmokeError> {
        let plan = &self.plan;
        let Some(top) = hits.first() else {
            return vec![SmokeError::EmptyResult];
        };

        let mut findings = Vec::new();
        if hits.len() > plan.limit {
            findings.push(SmokeError::TooManyResults {
                limit: plan.limit,
                actual: hits.len(),
            });
        }
        if top.id != plan.query_id {
            findings.push(SmokeError::UnexpectedTopHit {
                expected: plan.query_id,
                actual: top.id,
            });
        }
        if let Some(expected) = plan.metric.self_distance() {
            if (top.distance - expected).abs() > plan.distance_tolerance {
                findings.push(SmokeError::DistanceOutOfTolerance {
                    distance: top.distance,
                    expected,
                    tolerance: plan.distance_tolerance,
                });
            }
        }
        findings
    }

    async fn disconnect(&self, store: &mut C::Store, report: &mut RunReport) {
        let timer = self.begin(Step::Disconnect);
        let alias = store.alias().to_string();
        match store.disconnect().await {
            Ok(()) => self.pass(report, timer, format!("Released connection '{alias}'")),
            Err(error) => {
                warn!(%error, alias, "Disconnect failed");
                self.warn(report, timer, error.to_string(), None);
            }
        }
    }

    fn vector_field(&self) -> &str {
        self.schema
            .vector_field()
            .map_or("vector", |f| f.name.as_str())
    }

    fn begin(&self, step: Step) -> StepTimer {
        info!(step = step.label(), "Step started");
        self.observer.step_started(step);
        StepTimer {
            step,
            timer: Timer::start(budget_for(step)),
        }
    }

    fn record(
        &self,
        report: &mut RunReport,
        timer: StepTimer,
        status: StepStatus,
        message: String,
        suggestion: Option<String>,
    ) {
        let (duration, budget) = timer.timer.stop();
        let step_report = StepReport {
            step: timer.step,
            status,
            message,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            budget,
            suggestion,
        };
        self.observer.step_finished(&step_report);
        report.steps.push(step_report);
    }

    fn pass(&self, report: &mut RunReport, timer: StepTimer, message: String) {
        self.record(report, timer, StepStatus::Pass, message, None);
    }

    fn warn(
        &self,
        report: &mut RunReport,
        timer: StepTimer,
        message: String,
        suggestion: Option<String>,
    ) {
        self.record(report, timer, StepStatus::Warning, message, suggestion);
    }

    fn fail(&self, report: &mut RunReport, timer: StepTimer, error: SmokeError) -> Fatal {
        let step = timer.step;
        warn!(step = step.label(), %error, "Step failed");
        self.record(
            report,
            timer,
            StepStatus::Error,
            error.to_string(),
            error.suggestion().map(str::to_string),
        );
        Fatal { step, error }
    }

    /// Pass the step when there are no findings. Otherwise fail on the first
    /// finding in strict mode, or record them all as a warning.
    fn verify(
        &self,
        report: &mut RunReport,
        timer: StepTimer,
        mut findings: Vec<SmokeError>,
        message: String,
    ) -> std::result::Result<(), Fatal> {
        if findings.is_empty() {
            self.pass(report, timer, message);
            return Ok(());
        }
        let downgradable = findings.iter().all(SmokeError::is_verification_finding);
        if self.plan.strict || !downgradable {
            let first = findings.remove(0);
            return Err(self.fail(report, timer, first));
        }
        let details: Vec<String> = findings.iter().map(ToString::to_string).collect();
        self.warn(
            report,
            timer,
            format!("{message}; {}", details.join("; ")),
            Some("Strict mode would fail this run.".to_string()),
        );
        Ok(())
    }
}

/// Category recorded in the report for a fatal error at `step`.
///
/// A version query that fails means the service is not really usable, a
/// rejected collection or index definition is a schema problem, and an
/// undecodable search answer is a query problem.
fn failure_category(step: Step, error: &SmokeError) -> ErrorCategory {
    match (step, error.category()) {
        (Step::Connect | Step::ServerVersion, _) => ErrorCategory::Connectivity,
        (Step::Search, _) if matches!(error, SmokeError::MalformedResponse { .. }) => {
            ErrorCategory::Query
        }
        (Step::PrepareCollection | Step::BuildIndex, ErrorCategory::Service) => {
            ErrorCategory::Schema
        }
        (_, category) => category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plan_matches_classic_smoke_test() {
        let plan = RunPlan::default();
        assert_eq!(plan.collection, "test_collection");
        assert_eq!(plan.dimension, 128);
        assert_eq!(plan.count, 10);
        assert_eq!(plan.metric, MetricType::L2);
        assert_eq!(plan.index_type, IndexType::IvfFlat);
        assert_eq!(plan.nlist, 128);
        assert_eq!(plan.nprobe, 10);
        assert_eq!(plan.limit, 3);
        assert_eq!(plan.query_id, 0);
        assert!(plan.strict);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<(&str, Box<dyn Fn(&mut RunPlan)>)> = vec![
            ("collection.name", Box::new(|p: &mut RunPlan| p.collection = "  ".into())),
            ("collection.dimension", Box::new(|p: &mut RunPlan| p.dimension = 0)),
            ("data.count", Box::new(|p: &mut RunPlan| p.count = 0)),
            ("search.limit", Box::new(|p: &mut RunPlan| p.limit = 0)),
            ("index.nlist", Box::new(|p: &mut RunPlan| p.nlist = 0)),
            ("search.nprobe", Box::new(|p: &mut RunPlan| p.nprobe = 0)),
            ("search.query_id", Box::new(|p: &mut RunPlan| p.query_id = 10)),
            ("search.query_id", Box::new(|p: &mut RunPlan| p.query_id = -1)),
            ("search.distance_tolerance", Box::new(|p: &mut RunPlan| p.distance_tolerance = f32::NAN)),
            ("load.poll_interval_ms", Box::new(|p: &mut RunPlan| p.load_poll_interval = Duration::ZERO)),
            ("connection.version_path", Box::new(|p: &mut RunPlan| p.connect.version_path = Some("api/version".into()))),
        ];

        for (expected_key, mutate) in cases {
            let mut plan = RunPlan::default();
            mutate(&mut plan);
            match plan.validate() {
                Err(SmokeError::InvalidSetting { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("{expected_key}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn flat_index_ignores_nlist() {
        let plan = RunPlan {
            index_type: IndexType::Flat,
            nlist: 0,
            nprobe: 0,
            ..RunPlan::default()
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn failure_category_overrides() {
        let rejected = SmokeError::service("create index", 1100, "bad params");
        assert_eq!(
            failure_category(Step::BuildIndex, &rejected),
            ErrorCategory::Schema
        );
        assert_eq!(
            failure_category(Step::Insert, &rejected),
            ErrorCategory::Service
        );
        assert_eq!(
            failure_category(Step::Search, &SmokeError::malformed("search", "bad topks")),
            ErrorCategory::Query
        );
        let unauthenticated = SmokeError::service("list collections", 1800, "user hasn't authenticated");
        assert_eq!(
            failure_category(Step::Connect, &unauthenticated),
            ErrorCategory::Connectivity
        );
        let malformed = SmokeError::malformed("get server version", "empty body");
        assert_eq!(
            failure_category(Step::ServerVersion, &malformed),
            ErrorCategory::Connectivity
        );
    }
}
