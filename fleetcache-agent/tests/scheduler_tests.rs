//! Periodic task tests: load + publish, stale entry flagging, metrics and
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use fleetcache_agent::{caching_agent_task, run_pass, AgentMetrics};
use fleetcache_core::{ComputeError, Namespace};
use fleetcache_storage::Store;
use tokio::sync::watch;

#[path = "support/harness.rs"]
mod harness;
use harness::Harness;

#[tokio::test]
async fn test_run_pass_publishes_graph() {
    let h = Harness::new(5_000);
    h.add_server_group("app-v001", 1_000, &["vm-0", "vm-1"]);
    let metrics = AgentMetrics::new();

    let result = run_pass(&h.agent, h.store.as_ref(), &metrics)
        .await
        .expect("pass succeeds");

    assert_eq!(h.stored_ids(Namespace::Instances).await.len(), 2);
    assert_eq!(
        h.stored_ids(Namespace::ServerGroups).await,
        vec![h.key("app-v001")]
    );
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.passes, 1);
    assert_eq!(snapshot.failures, 0);
    assert_eq!(snapshot.records_published, result.record_count() as u64);
}

#[tokio::test]
async fn test_deleted_server_group_is_evicted_on_next_pass() {
    let h = Harness::new(5_000);
    h.add_server_group("app-v001", 1_000, &["vm-0"]);
    h.add_server_group("app-v002", 1_000, &["vm-1"]);
    let metrics = AgentMetrics::new();
    run_pass(&h.agent, h.store.as_ref(), &metrics)
        .await
        .expect("first pass");
    assert_eq!(h.stored_ids(Namespace::ServerGroups).await.len(), 2);

    // Another region's record shares the namespace and must survive.
    let mut elsewhere = h
        .store
        .get(Namespace::ServerGroups, &h.key("app-v002"))
        .await
        .expect("read")
        .expect("stored");
    elsewhere.id = h.agent.keys().server_group("app-v002", "westus", "my-acct");
    h.store
        .put(Namespace::ServerGroups, elsewhere.clone(), None)
        .await
        .expect("put");

    h.compute.remove_server_group("rg-app", "app-v001");
    run_pass(&h.agent, h.store.as_ref(), &metrics)
        .await
        .expect("second pass");

    let mut expected = vec![elsewhere.id.clone(), h.key("app-v002")];
    expected.sort();
    let mut stored = h.stored_ids(Namespace::ServerGroups).await;
    stored.sort();
    assert_eq!(stored, expected);
    assert_eq!(
        h.stored_ids(Namespace::Instances).await,
        vec![h
            .agent
            .keys()
            .instance("app-v002", "vm-1", "eastus", "my-acct")]
    );
}

#[tokio::test]
async fn test_consumed_entry_is_flagged_on_next_pass() {
    let h = Harness::new(5_000);
    let server_group = h.add_server_group("app-v001", 1_000, &["vm-0"]);
    h.seed_snapshot(&server_group, &[], 2_000).await;
    let key = h.key("app-v001");
    let metrics = AgentMetrics::new();

    let first = run_pass(&h.agent, h.store.as_ref(), &metrics)
        .await
        .expect("first pass");
    assert!(first.evictions_for(Namespace::OnDemand).is_empty());
    let stored = h.on_demand_entry(&key).await.expect("entry kept");
    assert_eq!(stored.processed_count, 1);
    assert_eq!(metrics.snapshot().on_demand_consumed, 1);

    h.clock.advance(Duration::from_secs(1));
    let second = run_pass(&h.agent, h.store.as_ref(), &metrics)
        .await
        .expect("second pass");

    assert_eq!(second.evictions_for(Namespace::OnDemand), [key.clone()]);
    assert!(h.on_demand_entry(&key).await.is_none());
    assert_eq!(metrics.snapshot().on_demand_consumed, 1);
    assert_eq!(metrics.snapshot().passes, 2);
}

#[tokio::test]
async fn test_failed_pass_publishes_nothing() {
    let h = Harness::new(5_000);
    h.add_server_group("app-v001", 1_000, &["vm-0"]);
    h.compute.fail_instances_with(ComputeError::Throttled {
        retry_after_ms: 1_000,
    });
    let metrics = AgentMetrics::new();

    assert!(run_pass(&h.agent, h.store.as_ref(), &metrics).await.is_err());
    assert!(h.stored_ids(Namespace::ServerGroups).await.is_empty());
    assert_eq!(metrics.snapshot().passes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_task_runs_until_shutdown() {
    let h = Harness::new(5_000);
    h.add_server_group("app-v001", 1_000, &["vm-0"]);
    let store: Arc<dyn Store> = h.store_dyn();
    let Harness { agent, store: memory, .. } = h;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(caching_agent_task(Arc::new(agent), store, shutdown_rx));

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    shutdown_tx.send(true).expect("task still listening");
    let metrics = handle.await.expect("task joins");

    let snapshot = metrics.snapshot();
    assert!(snapshot.passes >= 2, "passes = {}", snapshot.passes);
    assert_eq!(snapshot.failures, 0);
    assert_eq!(
        memory
            .get_identifiers(Namespace::ServerGroups)
            .await
            .expect("ids")
            .len(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_task_counts_failures_and_keeps_running() {
    let h = Harness::new(5_000);
    h.add_server_group("app-v001", 1_000, &["vm-0"]);
    h.compute.fail_instances_with(ComputeError::Throttled {
        retry_after_ms: 1_000,
    });
    let store: Arc<dyn Store> = h.store_dyn();
    let Harness { agent, .. } = h;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(caching_agent_task(Arc::new(agent), store, shutdown_rx));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    shutdown_tx.send(true).expect("task still listening");
    let metrics = handle.await.expect("task joins");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.passes, 0);
    assert!(snapshot.failures >= 1);
}
