//! Periodic caching task.
//!
//! Drives one reconciliation pass per tick for a single agent and publishes
//! each completed result. Passes never overlap: the next tick is only
//! awaited once the previous pass has been published.
//!
//! Before each pass, on-demand entries that were already consumed at least
//! once and were captured before the pass started are flagged for eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fleetcache_core::{FleetCacheResult, Namespace, RecordAttributes, Timestamp};
use fleetcache_storage::Store;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::agent::ServerGroupCachingAgent;
use crate::publish::publish_cache_result;
use crate::result::CacheResult;

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the caching task.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    /// Total passes completed and published
    pub passes: AtomicU64,

    /// Total passes that failed to load or publish
    pub failures: AtomicU64,

    /// Total on-demand entries consumed by passes
    pub on_demand_consumed: AtomicU64,

    /// Total records written by publishes
    pub records_published: AtomicU64,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> AgentMetricsSnapshot {
        AgentMetricsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            on_demand_consumed: self.on_demand_consumed.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of agent metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentMetricsSnapshot {
    pub passes: u64,
    pub failures: u64,
    pub on_demand_consumed: u64,
    pub records_published: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run reconciliation passes until the shutdown signal is received.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(caching_agent_task(agent, store, shutdown_rx));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn caching_agent_task(
    agent: Arc<ServerGroupCachingAgent>,
    store: Arc<dyn Store>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<AgentMetrics> {
    let metrics = Arc::new(AgentMetrics::new());

    let mut pass_interval = interval(agent.config().scan_interval);
    pass_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        agent_type = %agent.agent_type(),
        scan_interval_secs = agent.config().scan_interval.as_secs(),
        "Caching agent task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!(agent_type = %agent.agent_type(), "Caching agent task shutting down");
                    break;
                }
            }

            _ = pass_interval.tick() => {
                if let Err(e) = run_pass(&agent, store.as_ref(), &metrics).await {
                    metrics.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        agent_type = %agent.agent_type(),
                        error = %e,
                        "Caching pass failed"
                    );
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        agent_type = %agent.agent_type(),
        passes = snapshot.passes,
        failures = snapshot.failures,
        on_demand_consumed = snapshot.on_demand_consumed,
        records_published = snapshot.records_published,
        "Caching agent task completed"
    );

    metrics
}

/// Load, then publish, one pass.
pub async fn run_pass(
    agent: &ServerGroupCachingAgent,
    store: &dyn Store,
    metrics: &AgentMetrics,
) -> FleetCacheResult<CacheResult> {
    let started_at = agent.clock.now();
    let flagged = stale_on_demand_ids(agent, started_at).await?;

    let result = agent.load_data_with_evictions(&flagged).await?;
    let summary = publish_cache_result(store, &result, agent).await?;

    metrics.passes.fetch_add(1, Ordering::Relaxed);
    metrics
        .on_demand_consumed
        .fetch_add(consumed_since(&result, started_at), Ordering::Relaxed);
    metrics
        .records_published
        .fetch_add(summary.written, Ordering::Relaxed);

    Ok(result)
}

/// Entries already consumed at least once and captured before `started_at`.
async fn stale_on_demand_ids(
    agent: &ServerGroupCachingAgent,
    started_at: Timestamp,
) -> FleetCacheResult<Vec<String>> {
    let pending = agent.pending_on_demand_requests().await?;
    Ok(pending
        .into_iter()
        .filter(|request| request.processed_count > 0 && request.cache_time < started_at)
        .map(|request| request.id)
        .collect())
}

/// Number of on-demand records stamped by the pass that started at `started_at`.
fn consumed_since(result: &CacheResult, started_at: Timestamp) -> u64 {
    result
        .records(Namespace::OnDemand)
        .iter()
        .filter(|record| match &record.attributes {
            RecordAttributes::OnDemand(attributes) => attributes
                .processed_time
                .map(|time| time >= started_at)
                .unwrap_or(false),
            _ => false,
        })
        .count() as u64
}
