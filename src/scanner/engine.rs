//! Sweep engine: worker pool, bounded job queue and result collection

use super::{max_partition_size, ResultStore, ScanState, ScanSummary, MAX_QUEUE_CAPACITY};
use crate::config::Options;
use crate::error::SweepError;
use crate::network::{Subnet, SubnetHosts};
use crate::ping::{PingStats, Pinger, PingerKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

/// One sweep over every address of a subnet.
///
/// A session is built from validated [`Options`] and a pinger chosen by the
/// caller, runs exactly once, and then exposes the per-host results.
pub struct ScanSession {
    subnet: Subnet,
    targets: Option<SubnetHosts>,
    count: usize,
    interval: Duration,
    timeout: Duration,
    max_workers: usize,
    batch_size: usize,
    pinger: Arc<dyn Pinger>,
    state: ScanState,
    results: HashMap<String, PingStats>,
    total_results: usize,
    elapsed: Duration,
}

impl ScanSession {
    /// Validate the options and prepare a session that probes with `pinger`
    pub fn new(options: &Options, pinger: Arc<dyn Pinger>) -> crate::Result<Self> {
        options.validate()?;

        let subnet = Subnet::parse(&options.subnet)?;

        let count = usize::try_from(options.count)
            .map_err(|_| SweepError::Config(format!("count {} out of range", options.count)))?;
        let max_workers = usize::try_from(options.max_workers).map_err(|_| {
            SweepError::Config(format!("max workers {} out of range", options.max_workers))
        })?;

        // blocks with more than usize::MAX hosts are sized as usize::MAX
        let sizing_hosts = subnet.host_count().min(usize::MAX as u128);
        let batch_size = max_partition_size(sizing_hosts, max_workers)?;

        log::debug!(
            "Session for {} ({} hosts): count={}, workers={}, batch={}, pinger={}",
            subnet,
            subnet.host_count(),
            count,
            max_workers,
            batch_size,
            pinger.name()
        );

        Ok(Self {
            subnet,
            targets: Some(subnet.hosts()),
            count,
            interval: options.interval(),
            timeout: options.timeout(),
            max_workers,
            batch_size,
            pinger,
            state: ScanState::Created,
            results: HashMap::new(),
            total_results: 0,
            elapsed: Duration::ZERO,
        })
    }

    /// Prepare a session with the pinger implementation named by `kind`
    pub fn with_kind(options: &Options, kind: PingerKind) -> crate::Result<Self> {
        Self::new(options, kind.build())
    }

    /// Prepare a session with the pinger implementation named in the options
    pub fn from_options(options: &Options) -> crate::Result<Self> {
        Self::with_kind(options, options.pinger)
    }

    /// Probe every address of the subnet.
    ///
    /// Spawns `max_workers` tasks, feeds them addresses in ascending order
    /// through a bounded queue and returns once all of them have exited and
    /// their results are collected. A failed probe is recorded as an empty
    /// result for that host and never stops the sweep.
    pub async fn run(&mut self) -> crate::Result<()> {
        if self.state != ScanState::Created {
            return Err(SweepError::AlreadyRun);
        }
        let targets = self.targets.take().ok_or(SweepError::AlreadyRun)?;

        let start = Instant::now();
        self.state = ScanState::Dispatching;

        let (job_tx, job_rx) = mpsc::channel::<String>(self.batch_size.min(MAX_QUEUE_CAPACITY));
        let jobs = Arc::new(Mutex::new(job_rx));
        let store = ResultStore::new();

        let mut handles = Vec::with_capacity(self.max_workers);
        for id in 0..self.max_workers {
            let worker = Worker {
                id,
                pinger: Arc::clone(&self.pinger),
                count: self.count,
                interval: self.interval,
                timeout: self.timeout,
                jobs: Arc::clone(&jobs),
                store: store.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        // only workers hold the receiver, so dispatch fails once all of them are gone
        drop(jobs);
        log::debug!("Spawned {} workers.", self.max_workers);

        log::debug!("Assigning tasks to all workers.");
        for addr in targets {
            let target = addr.to_string();
            log::trace!("Assigned task: {}", target);
            if job_tx.send(target).await.is_err() {
                log::error!("All workers exited before dispatch finished");
                break;
            }
        }

        log::debug!("Waiting for all workers to finish their jobs.");
        self.state = ScanState::Draining;
        drop(job_tx);

        let mut failure = None;
        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Worker task failed: {}", e);
                failure.get_or_insert_with(|| e.to_string());
            }
        }

        log::debug!("All workers stopped. Storing the results.");
        self.results = store.into_results().await;
        self.total_results = self.results.len();
        self.elapsed = start.elapsed();
        self.state = ScanState::Completed;
        log::debug!(
            "Run finished: {} results in {:?}",
            self.total_results,
            self.elapsed
        );

        match failure {
            Some(e) => Err(SweepError::Worker(e)),
            None => Ok(()),
        }
    }

    /// Every probed host and its result, empty until the run completes
    pub fn results(&self) -> &HashMap<String, PingStats> {
        &self.results
    }

    /// Hosts that answered at least one echo
    pub fn online_hosts(&self) -> HashMap<String, PingStats> {
        self.results
            .iter()
            .filter(|(_, stats)| stats.is_online())
            .map(|(addr, stats)| (addr.clone(), *stats))
            .collect()
    }

    pub fn total_results(&self) -> usize {
        self.total_results
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary::from_results(&self.results)
    }

    pub fn subnet(&self) -> &Subnet {
        &self.subnet
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Capacity per worker used to size the job queue
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pinger_name(&self) -> &str {
        self.pinger.name()
    }

    /// Wall time of the run, zero before it completes
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// A single pool member pulling addresses until the queue is closed and empty
struct Worker {
    id: usize,
    pinger: Arc<dyn Pinger>,
    count: usize,
    interval: Duration,
    timeout: Duration,
    jobs: Arc<Mutex<mpsc::Receiver<String>>>,
    store: ResultStore,
}

impl Worker {
    async fn run(self) {
        loop {
            let job = {
                let mut jobs = self.jobs.lock().await;
                jobs.recv().await
            };
            let Some(target) = job else {
                break;
            };
            log::trace!("[worker {}] Got task {}", self.id, target);

            let stats = match self
                .pinger
                .ping(&target, self.count, self.interval, self.timeout)
                .await
            {
                Ok(stats) => stats,
                Err(e) => {
                    log::debug!("[worker {}] Ping failed for {}: {}", self.id, target, e);
                    PingStats::default()
                }
            };

            self.store.insert(target, stats).await;

            // per-worker pacing on top of the pinger's own interval
            tokio::time::sleep(self.interval).await;
        }

        log::trace!("[worker {}] Queue drained, exiting", self.id);
    }
}
