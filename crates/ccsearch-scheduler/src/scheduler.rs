//! Fixed-interval scheduler service.
//!
//! Each registered job gets a ticker task. The first tick fires one period
//! after start; a tick that arrives while the ticker is behind is skipped.
//! Every tick spawns a detached run of the job on the shared task tracker so
//! shutdown can wait for in-flight runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::{SchedulerConfig, SchedulerError};

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type JobFn = Arc<dyn Fn(CancellationToken) -> JobFuture + Send + Sync>;

struct IntervalJob {
    name: String,
    period: Duration,
    run: JobFn,
}

/// Owns the job tickers and their lifecycle.
///
/// Jobs receive a clone of the shutdown token; long-running jobs should
/// watch it and return early once cancelled.
pub struct SchedulerService {
    config: SchedulerConfig,
    jobs: Vec<IntervalJob>,
    shutdown_token: CancellationToken,
    tracker: TaskTracker,
    is_running: AtomicBool,
}

impl SchedulerService {
    /// Create a scheduler with no jobs. Nothing runs until `start()`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            jobs: Vec::new(),
            shutdown_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            is_running: AtomicBool::new(false),
        }
    }

    /// Register a job that runs every `period`.
    ///
    /// If the scheduler is already running the job's ticker starts
    /// immediately.
    ///
    /// # Errors
    ///
    /// `InvalidInterval` for a zero period, `DuplicateJob` if `name` is taken.
    pub fn add_interval_job<F, Fut>(
        &mut self,
        name: &str,
        period: Duration,
        job_fn: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::InvalidInterval(name.to_string()));
        }
        if self.jobs.iter().any(|job| job.name == name) {
            return Err(SchedulerError::DuplicateJob(name.to_string()));
        }

        let run: JobFn = Arc::new(move |token| Box::pin(job_fn(token)));
        let job = IntervalJob {
            name: name.to_string(),
            period,
            run,
        };

        if self.is_running() {
            self.spawn_ticker(&job);
        }
        info!(job = %name, period_ms = period.as_millis() as u64, "Job registered");
        self.jobs.push(job);

        Ok(())
    }

    /// Start ticking every registered job.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::AlreadyRunning` if the scheduler is already started.
    pub fn start(&self) -> Result<(), SchedulerError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        for job in &self.jobs {
            self.spawn_ticker(job);
        }
        info!(jobs = self.jobs.len(), "Scheduler started");

        Ok(())
    }

    /// Shutdown the scheduler gracefully.
    ///
    /// Cancels the shutdown token, which stops every ticker, then waits up
    /// to the configured timeout for in-flight job runs. Runs still going
    /// after the timeout are left detached. The scheduler can be started
    /// again afterwards with a fresh token.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if the scheduler is not started.
    pub async fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();
        self.tracker.close();

        let timeout = self.config.shutdown_timeout();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                remaining = self.tracker.len(),
                "Jobs still running after shutdown timeout"
            );
        }

        self.shutdown_token = CancellationToken::new();
        self.tracker = TaskTracker::new();
        self.is_running.store(false, Ordering::SeqCst);
        info!("Scheduler shutdown complete");

        Ok(())
    }

    /// Clone of the current shutdown token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Names of the registered jobs, in registration order.
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.name.as_str()).collect()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn spawn_ticker(&self, job: &IntervalJob) {
        let name = job.name.clone();
        let period = job.period;
        let run = job.run.clone();
        let token = self.shutdown_token.clone();
        let tracker = self.tracker.clone();

        self.tracker.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let run = run.clone();
                        let name = name.clone();
                        let token = token.clone();
                        tracker.spawn(async move {
                            debug!(job = %name, "Job started");
                            let start = Instant::now();
                            run(token).await;
                            debug!(
                                job = %name,
                                duration_ms = start.elapsed().as_millis() as u64,
                                "Job completed"
                            );
                        });
                    }
                }
            }

            debug!(job = %name, "Ticker stopped");
        });
    }
}
