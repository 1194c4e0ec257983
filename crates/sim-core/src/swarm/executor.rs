//! Swarm Executor
//!
//! Runs one policy across many independently seeded worlds on a pool of
//! worker threads and gathers the results.
//!
//! Workers pull seeds from a shared job queue and stream messages back over
//! a result channel. Every world builds its own world instance and its own
//! policy clone on the worker, so nothing mutable is shared between worlds.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use sim_types::SimulationResult;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::config::{ExecutorType, SwarmConfig};
use super::result::{FailureKind, SwarmResult, WorldFailure};
use crate::config::{EvaluationConfig, SimulatorConfig};
use crate::error::ConfigError;
use crate::policy::Policy;
use crate::simulator::Simulator;
use crate::world::World;

/// Called with `(completed, total)` after each world is accounted for.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Upper bound on how long the collector waits between bookkeeping passes.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

enum WorkerMessage {
    Started {
        worker: usize,
        seed: u64,
    },
    Finished {
        seed: u64,
        outcome: Result<SimulationResult, WorldFailure>,
    },
}

/// Runs a policy across `n_worlds` worlds built by a seed-parameterized
/// factory.
///
/// # Example
///
/// ```ignore
/// let executor = SwarmExecutor::new(|seed| MyWorld::new(seed), SwarmConfig::new(1000)?)?;
/// let swarm = executor.run(&my_policy);
/// println!("success rate: {:.1}%", swarm.success_rate() * 100.0);
/// ```
pub struct SwarmExecutor<F> {
    factory: Arc<F>,
    config: SwarmConfig,
    simulator: SimulatorConfig,
    progress: Option<ProgressCallback>,
}

impl<F, W> SwarmExecutor<F>
where
    F: Fn(u64) -> W + Send + Sync + 'static,
    W: World,
{
    /// Creates an executor, validating the configuration eagerly.
    pub fn new(factory: F, config: SwarmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            factory: Arc::new(factory),
            config,
            simulator: SimulatorConfig::default(),
            progress: None,
        })
    }

    /// Creates an executor from a loaded evaluation config.
    pub fn from_config(factory: F, config: &EvaluationConfig) -> Result<Self, ConfigError> {
        Self::new(factory, config.swarm.clone())?.with_simulator(config.simulator.clone())
    }

    /// Sets the simulator parameters used for every world.
    pub fn with_simulator(mut self, simulator: SimulatorConfig) -> Result<Self, ConfigError> {
        simulator.validate()?;
        self.simulator = simulator;
        Ok(self)
    }

    pub fn with_progress_callback<C>(mut self, callback: C) -> Self
    where
        C: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn simulator_config(&self) -> &SimulatorConfig {
        &self.simulator
    }

    /// Runs every world on the worker pool.
    ///
    /// Results arrive in completion order. Every world ends up either in
    /// `results` or in `errors`, never in neither.
    pub fn run<P>(&self, policy: &P) -> SwarmResult
    where
        P: Policy + Clone + Send + 'static,
    {
        let start = Instant::now();
        let total = self.config.n_worlds;
        let timeout = self.config.timeout();
        let workers = self.config.worker_count();

        tracing::info!(
            policy = policy.name(),
            worlds = total,
            workers,
            executor = %self.config.executor_type,
            base_seed = self.config.base_seed,
            "starting swarm evaluation"
        );

        let (job_tx, job_rx) = unbounded::<u64>();
        for seed in self.config.seeds() {
            // receiver is alive until the end of this function
            let _ = job_tx.send(seed);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<WorkerMessage>();
        let mut pool = WorkerPool {
            factory: Arc::clone(&self.factory),
            policy: policy.clone(),
            simulator: self.simulator.clone(),
            jobs: job_rx,
            results: result_tx,
            single_shot: self.config.executor_type == ExecutorType::Isolated,
            handles: Vec::new(),
            retired: HashMap::new(),
            next_id: 0,
        };
        for _ in 0..workers {
            pool.spawn_worker();
        }

        let mut outstanding: BTreeSet<u64> = self.config.seeds().collect();
        let mut running: HashMap<u64, (usize, Instant)> = HashMap::new();
        let mut results = Vec::with_capacity(total);
        let mut errors = Vec::new();
        let mut completed = 0usize;

        while !outstanding.is_empty() {
            match result_rx.recv_timeout(next_wait(timeout, &running)) {
                Ok(WorkerMessage::Started { worker, seed }) => {
                    running.insert(seed, (worker, Instant::now()));
                }
                Ok(WorkerMessage::Finished { seed, outcome }) => {
                    running.remove(&seed);
                    if !outstanding.remove(&seed) {
                        tracing::debug!(seed, "discarding late result from timed-out world");
                        continue;
                    }
                    record(outcome, &mut results, &mut errors);
                    completed += 1;
                    self.report_progress(completed);
                    if pool.single_shot && !pool.jobs.is_empty() {
                        pool.spawn_worker();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(limit) = timeout {
                let now = Instant::now();
                let expired: Vec<(u64, usize)> = running
                    .iter()
                    .filter(|(_, (_, started))| now.duration_since(*started) >= limit)
                    .map(|(seed, (worker, _))| (*seed, *worker))
                    .collect();

                for (seed, worker) in expired {
                    running.remove(&seed);
                    outstanding.remove(&seed);
                    pool.retire(worker);

                    let failure = WorldFailure::new(
                        seed,
                        FailureKind::Timeout,
                        format!("world exceeded {:.3}s timeout", limit.as_secs_f64()),
                    );
                    tracing::warn!(seed, error = %failure, "world timed out");
                    errors.push(failure);
                    completed += 1;
                    self.report_progress(completed);

                    pool.spawn_worker();
                }
            }

            // All workers gone and nothing left in flight: whatever is still
            // outstanding will never arrive.
            if pool.all_finished() && result_rx.is_empty() && !outstanding.is_empty() {
                for seed in std::mem::take(&mut outstanding) {
                    let failure = WorldFailure::new(seed, FailureKind::Scheduler, "world was never run by a worker");
                    tracing::warn!(seed, error = %failure, "world dropped by scheduler");
                    errors.push(failure);
                    completed += 1;
                    self.report_progress(completed);
                }
            }
        }

        pool.join_finished();

        let elapsed = start.elapsed().as_secs_f64();
        tracing::info!(
            policy = policy.name(),
            completed = results.len(),
            errors = errors.len(),
            seconds = elapsed,
            "swarm evaluation finished"
        );

        SwarmResult::new(policy.name(), results, errors, self.config.clone(), elapsed)
    }

    /// Runs every world on the calling thread, in seed order.
    ///
    /// Produces the same population as [`run`](Self::run) for the same
    /// seeds. The per-world timeout is not enforced here.
    pub fn run_sequential<P>(&self, policy: &P) -> SwarmResult
    where
        P: Policy + Clone,
    {
        let start = Instant::now();
        let mut results = Vec::with_capacity(self.config.n_worlds);
        let mut errors = Vec::new();

        for (i, seed) in self.config.seeds().enumerate() {
            let outcome = run_world(self.factory.as_ref(), policy, &self.simulator, seed);
            record(outcome, &mut results, &mut errors);
            self.report_progress(i + 1);
        }

        let elapsed = start.elapsed().as_secs_f64();
        SwarmResult::new(policy.name(), results, errors, self.config.clone(), elapsed)
    }

    fn report_progress(&self, completed: usize) {
        let total = self.config.n_worlds;
        if let Some(callback) = &self.progress {
            callback(completed, total);
        }
        if self.config.show_progress && completed % (total / 10).max(1) == 0 {
            let pct = completed as f64 / total as f64 * 100.0;
            tracing::info!("Progress: {}/{} ({:.0}%)", completed, total, pct);
        }
    }
}

/// Workers plus the bookkeeping needed to retire and replace them.
struct WorkerPool<F, P> {
    factory: Arc<F>,
    policy: P,
    simulator: SimulatorConfig,
    jobs: Receiver<u64>,
    results: Sender<WorkerMessage>,
    /// Each worker runs exactly one world, then exits
    single_shot: bool,
    handles: Vec<JoinHandle<()>>,
    retired: HashMap<usize, Arc<AtomicBool>>,
    next_id: usize,
}

impl<F, W, P> WorkerPool<F, P>
where
    F: Fn(u64) -> W + Send + Sync + 'static,
    W: World,
    P: Policy + Clone + Send + 'static,
{
    fn spawn_worker(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let retired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&retired);
        let factory = Arc::clone(&self.factory);
        let policy = self.policy.clone();
        let simulator = self.simulator.clone();
        let jobs = self.jobs.clone();
        let results = self.results.clone();
        let single_shot = self.single_shot;

        let spawned = thread::Builder::new()
            .name(format!("swarm-worker-{}", id))
            .spawn(move || {
                while !flag.load(Ordering::Acquire) {
                    let Ok(seed) = jobs.recv() else { break };
                    if results.send(WorkerMessage::Started { worker: id, seed }).is_err() {
                        break;
                    }
                    let outcome = run_world(factory.as_ref(), &policy, &simulator, seed);
                    if results.send(WorkerMessage::Finished { seed, outcome }).is_err() {
                        break;
                    }
                    if single_shot {
                        break;
                    }
                }
            });

        match spawned {
            Ok(handle) => {
                self.handles.push(handle);
                self.retired.insert(id, retired);
            }
            Err(err) => {
                tracing::warn!(worker = id, error = %err, "failed to spawn swarm worker");
            }
        }
    }

    /// Stops a worker from taking further jobs once its current world ends.
    fn retire(&mut self, worker: usize) {
        if let Some(flag) = self.retired.remove(&worker) {
            flag.store(true, Ordering::Release);
        }
    }

    fn all_finished(&self) -> bool {
        self.handles.iter().all(JoinHandle::is_finished)
    }

    /// Joins workers that have exited; abandoned ones are left detached.
    fn join_finished(self) {
        for handle in self.handles {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

/// How long to block on the result channel before the next bookkeeping pass.
fn next_wait(timeout: Option<Duration>, running: &HashMap<u64, (usize, Instant)>) -> Duration {
    let Some(limit) = timeout else {
        return POLL_INTERVAL;
    };
    let now = Instant::now();
    running
        .values()
        .map(|(_, started)| (*started + limit).saturating_duration_since(now))
        .min()
        .map_or(POLL_INTERVAL, |d| d.min(POLL_INTERVAL))
}

fn record(
    outcome: Result<SimulationResult, WorldFailure>,
    results: &mut Vec<SimulationResult>,
    errors: &mut Vec<WorldFailure>,
) {
    match outcome {
        Ok(result) => results.push(result),
        Err(failure) => {
            tracing::warn!(seed = failure.seed, kind = %failure.kind, error = %failure.message, "world failed");
            errors.push(failure);
        }
    }
}

/// Builds, runs and isolates a single world.
fn run_world<F, W, P>(
    factory: &F,
    policy: &P,
    simulator: &SimulatorConfig,
    seed: u64,
) -> Result<SimulationResult, WorldFailure>
where
    F: Fn(u64) -> W,
    W: World,
    P: Policy + Clone,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let world = factory(seed);
        let mut policy = policy.clone();
        policy.reset();
        Simulator::from_config(world, simulator).run(&mut policy, seed)
    }));

    match outcome {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(WorldFailure::from_error(seed, &err)),
        Err(payload) => Err(WorldFailure::new(seed, FailureKind::Panic, panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(7u8);

        assert_eq!(panic_message(a.as_ref()), "static");
        assert_eq!(panic_message(b.as_ref()), "owned");
        assert_eq!(panic_message(c.as_ref()), "unknown panic");
    }

    #[test]
    fn test_next_wait_bounds() {
        let mut running = HashMap::new();
        assert_eq!(next_wait(None, &running), POLL_INTERVAL);
        assert_eq!(next_wait(Some(Duration::from_secs(10)), &running), POLL_INTERVAL);

        running.insert(1, (0, Instant::now() - Duration::from_secs(5)));
        assert_eq!(next_wait(Some(Duration::from_secs(1)), &running), Duration::ZERO);
    }
}
