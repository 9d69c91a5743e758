//! Engine wiring and the public run surface

use std::collections::BTreeMap;
use std::sync::Arc;

use app_adapters::default_registry;
use browser_adapter::{AdapterError, BrowserLaunchConfig, BrowserPool, PageDriver};
use discovery_ladder::{DiscoveryLadder, DiscoveryService};
use heal_engine::{HealHistory, NoopHealHistory, SqliteHealHistory};
use orchestrator::{CheckpointStore, Orchestrator, OrchestratorError, RunOptions};
use readiness::{ProfileDetector, ReadinessConfig};
use run_store::{RunStore, StoreError};
use selector_cache::{SelectorCache, SqliteWarmTier};
use templating::{compile_plan, TemplateError};
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webpilot_core_types::{EngineConfig, ReqId, RunRecord, RunRequest};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Engine {
    config: EngineConfig,
    orchestrator: Arc<Orchestrator>,
    run_store: Arc<RunStore>,
    pool: OnceCell<BrowserPool>,
    cancel_root: CancellationToken,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let state_dir = config.state_dir.clone();

        let warm = if config.enable_memory {
            match SqliteWarmTier::open(&state_dir.join("selector_cache.db")) {
                Ok(tier) => Some(Box::new(tier) as Box<dyn selector_cache::WarmTier>),
                Err(err) => {
                    // Cache trouble never fails a run.
                    warn!(error = %err, "warm cache unavailable, running hot-only");
                    None
                }
            }
        } else {
            None
        };
        let cache = Arc::new(SelectorCache::new(
            config.enable_memory,
            std::time::Duration::from_secs(config.cache_ttl_hot_s),
            warm,
            config.drift_threshold,
            config.cache_retention_warm_d,
        ));

        let history: Arc<dyn HealHistory> = if config.enable_memory {
            match SqliteHealHistory::open(&state_dir.join("heal_history.db")) {
                Ok(history) => Arc::new(history),
                Err(err) => {
                    warn!(error = %err, "heal history unavailable, priors disabled");
                    Arc::new(NoopHealHistory)
                }
            }
        } else {
            Arc::new(NoopHealHistory)
        };

        let run_store = Arc::new(RunStore::open(
            &state_dir.join("runs.db"),
            state_dir.join("artifacts"),
        )?);
        let checkpoints = Arc::new(CheckpointStore::new(state_dir.join("checkpoints"))?);

        let discovery = Arc::new(DiscoveryService::new(
            DiscoveryLadder::new(default_registry()),
            cache,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            discovery,
            default_registry(),
            history,
            ReadinessConfig::default(),
            ProfileDetector::new(config.profile_default),
            checkpoints,
            Arc::clone(&run_store),
            RunOptions::from(&config),
        ));

        Ok(Self {
            config,
            orchestrator,
            run_store,
            pool: OnceCell::new(),
            cancel_root: CancellationToken::new(),
        })
    }

    /// Token cancelled on SIGTERM; in-flight runs flush a final checkpoint.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_root.clone()
    }

    pub fn run_store(&self) -> &Arc<RunStore> {
        &self.run_store
    }

    async fn pool(&self) -> Result<&BrowserPool, EngineError> {
        self.pool
            .get_or_try_init(|| async {
                let profile_dir = self.config.persistent_profiles.then(|| {
                    self.config
                        .profile_dir
                        .clone()
                        .unwrap_or_else(|| self.config.state_dir.join("profiles"))
                });
                let launch = BrowserLaunchConfig::default()
                    .with_headless(self.config.headless)
                    .with_stealth(self.config.stealth)
                    .with_profile_dir(profile_dir);
                BrowserPool::launch(launch, self.config.max_parallel).await
            })
            .await
            .map_err(EngineError::from)
    }

    /// Compile and execute one run against a pooled page.
    pub async fn run(&self, request: RunRequest) -> Result<RunRecord, EngineError> {
        self.run_with_vars(request, &BTreeMap::new(), &BTreeMap::new())
            .await
    }

    /// `overrides` and `defaults` join the request's dataset row for
    /// template resolution (dataset row wins).
    pub async fn run_with_vars(
        &self,
        request: RunRequest,
        overrides: &BTreeMap<String, String>,
        defaults: &BTreeMap<String, String>,
    ) -> Result<RunRecord, EngineError> {
        let plan = compile_plan(&request, overrides, defaults)?;
        info!(req_id = %request.req_id, steps = plan.len(), "run compiled");

        let guard = self.pool().await?.acquire().await?;
        let record = self
            .orchestrator
            .run(
                guard.driver(),
                &request,
                plan,
                self.cancel_root.child_token(),
            )
            .await?;
        guard.release().await;
        Ok(record)
    }

    /// One run per dataset row, sequentially. Each row becomes its own
    /// `req_id` suffix and dataset context; parallel callers still share
    /// the pool's `MAX_PARALLEL` bound.
    pub async fn run_dataset(
        &self,
        base: RunRequest,
        dataset: &templating::Dataset,
    ) -> Result<Vec<RunRecord>, EngineError> {
        let mut records = Vec::with_capacity(dataset.len());
        for (row_idx, row) in dataset.rows().enumerate() {
            let mut request = base.clone();
            request.req_id = ReqId(format!("{}-row{row_idx}", base.req_id.0));
            request.dataset_row = row.clone();
            records.push(self.run(request).await?);
        }
        Ok(records)
    }

    /// Embedded entry point for callers that already own a page (tests,
    /// custom harnesses).
    pub async fn run_with_driver(
        &self,
        driver: &dyn PageDriver,
        request: RunRequest,
    ) -> Result<RunRecord, EngineError> {
        let plan = compile_plan(&request, &BTreeMap::new(), &BTreeMap::new())?;
        Ok(self
            .orchestrator
            .run(driver, &request, plan, self.cancel_root.child_token())
            .await?)
    }

    /// Resume a checkpointed run. Without persistent profiles this
    /// degrades to re-running from step 0.
    pub async fn resume(&self, req_id: &ReqId) -> Result<RunRecord, EngineError> {
        let guard = self.pool().await?.acquire().await?;
        let record = self
            .orchestrator
            .resume(guard.driver(), req_id, self.cancel_root.child_token())
            .await?;
        guard.release().await;
        Ok(record)
    }

    pub async fn shutdown(&self) {
        self.cancel_root.cancel();
        if let Some(pool) = self.pool.get() {
            pool.shutdown().await;
        }
    }
}
