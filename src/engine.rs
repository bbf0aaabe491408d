// src/engine.rs
use crate::dedup::DedupGuard;
use crate::probe::{HttpProber, Probe};
use crate::queue::{QueueItem, WorkQueue};
use crate::resolver::{DnsLookup, Resolver};
use crate::session::Session;
use crate::sink::EventSink;
use crate::sources::{create_sources, Source};
use crate::types::{
    Candidate, Config, LinkType, ResolutionRecord, ScanSettings, ScanStats, SourceInfo, SubprobeError,
};
use crate::utils;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Runs scans. One engine can serve many concurrent scans; every scan gets
/// its own queue, dedup guard and counters.
pub struct ScanEngine {
    config: Arc<Config>,
    session: Session,
    dns: Arc<dyn DnsLookup>,
    prober: Arc<dyn Probe>,
}

#[derive(Debug, Default)]
struct Counters {
    candidates_queued: AtomicUsize,
    lookup_failures: AtomicUsize,
    duplicates: AtomicUsize,
    records_emitted: AtomicUsize,
    cnames_requeued: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, start: Instant) -> ScanStats {
        ScanStats {
            candidates_queued: self.candidates_queued.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            cnames_requeued: self.cnames_requeued.load(Ordering::Relaxed),
            duration: start.elapsed(),
        }
    }
}

/// State shared by the workers of one scan.
struct Worker {
    id: usize,
    queue: WorkQueue,
    visited: Arc<DedupGuard>,
    dns: Arc<dyn DnsLookup>,
    prober: Arc<dyn Probe>,
    sink: EventSink,
    counters: Arc<Counters>,
    max_cname_depth: usize,
}

impl ScanEngine {
    pub fn new(config: Config) -> Result<Self, SubprobeError> {
        let session = Session::new(&config)?;
        let dns: Arc<dyn DnsLookup> = Arc::new(Resolver::new(&config.resolver)?);
        let prober: Arc<dyn Probe> = Arc::new(HttpProber::new(session.clone(), config.probe_timeout));

        Ok(Self::with_components(config, session, dns, prober))
    }

    pub fn with_components(
        config: Config,
        session: Session,
        dns: Arc<dyn DnsLookup>,
        prober: Arc<dyn Probe>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            dns,
            prober,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan `settings.domain` with the wordlist and, when enabled, the
    /// aggregator source.
    pub async fn run(&self, settings: &ScanSettings, sink: EventSink) -> Result<ScanStats, SubprobeError> {
        settings.validate()?;
        let sources = create_sources(settings, &self.config, &self.session)?;
        self.run_with_sources(settings, sources, sink).await
    }

    pub async fn run_with_sources(
        &self,
        settings: &ScanSettings,
        sources: Vec<Arc<dyn Source>>,
        sink: EventSink,
    ) -> Result<ScanStats, SubprobeError> {
        settings.validate()?;

        info!(
            "Starting scan of {} with {} workers and {} sources",
            settings.domain,
            settings.workers,
            sources.len()
        );
        let start = Instant::now();

        let queue = WorkQueue::new(settings.workers);
        let visited = Arc::new(DedupGuard::new());
        let counters = Arc::new(Counters::default());

        let workers: Vec<JoinHandle<()>> = (0..settings.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    visited: visited.clone(),
                    dns: self.dns.clone(),
                    prober: self.prober.clone(),
                    sink: sink.clone(),
                    counters: counters.clone(),
                    max_cname_depth: self.config.max_cname_depth,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let (infos, producers): (Vec<SourceInfo>, Vec<_>) = sources
            .into_iter()
            .map(|source| {
                let info = source.info();
                let queue = queue.clone();
                let domain = settings.domain.clone();
                let producer = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = source.produce(&domain, &queue).await;
                    (result, started.elapsed())
                });
                (info, producer)
            })
            .unzip();

        let mut fatal = None;
        let outcomes = futures::future::join_all(producers).await;
        for (source_info, outcome) in infos.into_iter().zip(outcomes) {
            let (result, elapsed) = outcome.unwrap_or_else(|e| {
                let error = SubprobeError::SourceError {
                    source_name: source_info.name.clone(),
                    message: format!("task failed: {}", e),
                };
                (Err(error), Duration::ZERO)
            });

            match result {
                Ok(count) => {
                    counters.candidates_queued.fetch_add(count, Ordering::Relaxed);
                    info!("{}: queued {} candidates in {:?}", source_info.name, count, elapsed);
                }
                Err(e) => {
                    if source_info.required {
                        error!("{}: {}", source_info.name, e);
                    } else {
                        warn!("{}: {}", source_info.name, e);
                    }
                    sink.error(format!("Fail in usage {}: {}", source_info.name, failure_reason(&e)));
                    if source_info.required {
                        fatal = Some(e);
                    }
                }
            }
        }

        // Sources are done; CNAME targets may still be trickling in.
        queue.wait_idle().await;
        queue.shutdown(settings.workers).await;

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
            }
        }

        let stats = counters.snapshot(start);
        info!(
            "Scan of {} finished: {} records, {} duplicates, {} lookup failures in {:.2}s",
            settings.domain,
            stats.records_emitted,
            stats.duplicates,
            stats.lookup_failures,
            stats.duration.as_secs_f64()
        );
        sink.done();

        match fatal {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

impl Worker {
    async fn run(self) {
        loop {
            match self.queue.pop().await {
                Some(QueueItem::Candidate(candidate)) => {
                    let _done = self.queue.completion();
                    let name = candidate.name.clone();
                    if AssertUnwindSafe(self.process(candidate)).catch_unwind().await.is_err() {
                        error!("Worker {} panicked while processing {}", self.id, name);
                        self.sink.error(format!("Processing {} failed unexpectedly", name));
                    }
                }
                Some(QueueItem::Shutdown) | None => break,
            }
        }
        debug!("Worker {} stopped", self.id);
    }

    async fn process(&self, candidate: Candidate) {
        let name = candidate.name.as_str();

        let cname = match self.dns.lookup_cname(name).await {
            Ok(cname) => cname,
            Err(e) => {
                debug!("{}", e);
                Counters::bump(&self.counters.lookup_failures);
                return;
            }
        };

        if !self.visited.try_claim(name) {
            debug!("{} already processed", name);
            Counters::bump(&self.counters.duplicates);
            return;
        }

        let addresses = match self.dns.lookup_addresses(name).await {
            Ok(addresses) if !addresses.is_empty() => addresses,
            Ok(_) => {
                debug!("{} has no A records", name);
                return;
            }
            Err(e) => {
                debug!("{}", e);
                Counters::bump(&self.counters.lookup_failures);
                return;
            }
        };

        let target = utils::distinct_target(name, &cname);
        let link_type = if target.is_some() {
            LinkType::Cname
        } else {
            LinkType::Host
        };

        let status = match self.prober.probe(name).await {
            Ok(status) => status,
            Err(e) => {
                self.sink.error(e.to_string());
                return;
            }
        };

        for (index, ip) in addresses.iter().enumerate() {
            if index == 0 {
                self.sink.record(ResolutionRecord {
                    ip: *ip,
                    status,
                    link_type,
                    name: name.to_string(),
                    cname: target.clone().unwrap_or_default(),
                });
                Counters::bump(&self.counters.records_emitted);
            } else {
                debug!("{} also resolves to {}", name, ip);
            }
        }

        if let Some(target) = target {
            if candidate.depth < self.max_cname_depth {
                self.queue.requeue(candidate.cname_target(target));
                Counters::bump(&self.counters.cnames_requeued);
            } else {
                warn!(
                    "CNAME chain from {} exceeds depth {}, not following {}",
                    name, self.max_cname_depth, target
                );
            }
        }
    }
}

/// The error text without the source name, which the caller already prints.
fn failure_reason(error: &SubprobeError) -> String {
    match error {
        SubprobeError::SourceError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
