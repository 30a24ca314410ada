//! End-to-end routing through the public API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use replica_router::{
    ConnectionManager, EndpointKind, EndpointTarget, Intent, NestingPolicy, PoolConfig,
    ReplicationContext, RouterConfig, RouterError, RouterResult, RoutingDataSource,
    TransactionConfig,
};

/// 엔드포인트 이름을 기록하는 연결
#[derive(Debug)]
struct NamedConnection {
    name: String,
}

#[derive(Debug, Default)]
struct RecordingManager {
    connects: AtomicU64,
}

impl ConnectionManager for RecordingManager {
    type Connection = NamedConnection;

    async fn connect(&self, target: &EndpointTarget) -> RouterResult<NamedConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(NamedConnection {
            name: target.name.clone(),
        })
    }
}

const TOPOLOGY: &str = r#"
endpoints:
  - name: P
    role: primary
    url: postgres://localhost:5432/app
  - name: R1
    role: replica
    url: postgres://localhost:5433/app
  - name: R2
    role: replica
    url: postgres://localhost:5434/app
"#;

fn data_source() -> RoutingDataSource<RecordingManager> {
    let config = RouterConfig::from_yaml_str(TOPOLOGY).unwrap();
    RoutingDataSource::from_config(&config, RecordingManager::default()).unwrap()
}

#[tokio::test]
async fn test_primary_replica_scenario() {
    let ds = data_source();

    // 읽기 단위: 매 획득마다 R1 또는 R2
    let reads = ds
        .read_transaction(|| async {
            let mut names = Vec::new();
            for _ in 0..3 {
                names.push(ds.acquire_connection().await?.name.clone());
            }
            RouterResult::Ok(names)
        })
        .await
        .unwrap();
    assert_eq!(reads.len(), 3);
    assert!(reads.iter().all(|n| n == "R1" || n == "R2"), "{:?}", reads);

    // 쓰기 단위: 모두 P
    let writes = ds
        .write_transaction(|| async {
            let a = ds.acquire_connection().await?.name.clone();
            let b = ds.acquire_connection().await?.name.clone();
            RouterResult::Ok(vec![a, b])
        })
        .await
        .unwrap();
    assert_eq!(writes, vec!["P", "P"]);

    // 선언 없음: P
    let conn = ds.acquire_connection().await.unwrap();
    assert_eq!(conn.name, "P");
    assert_eq!(conn.endpoint(), EndpointKind::Primary);
}

#[tokio::test]
async fn test_reads_spread_over_all_replicas() {
    let ds = data_source();

    let seen = ds
        .read_transaction(|| async {
            let mut seen = HashSet::new();
            for _ in 0..200 {
                seen.insert(ds.acquire_connection().await?.name.clone());
            }
            RouterResult::Ok(seen)
        })
        .await
        .unwrap();

    assert_eq!(seen, HashSet::from(["R1".to_string(), "R2".to_string()]));
}

#[tokio::test]
async fn test_intent_cleared_after_each_unit() {
    let ds = data_source();

    let _ = ds
        .read_transaction(|| async { RouterResult::Ok(()) })
        .await;
    assert_eq!(ReplicationContext::get(), Intent::Unset);

    let failed: RouterResult<()> = ds
        .read_transaction(|| async { Err(RouterError::connection("query failed")) })
        .await;
    assert!(failed.is_err());
    assert_eq!(ReplicationContext::get(), Intent::Unset);
    assert_eq!(ds.resolve_target().unwrap().kind(), EndpointKind::Primary);
}

#[tokio::test]
async fn test_nested_read_inside_write() {
    let ds = data_source();

    let (inner, outer) = ds
        .write_transaction(|| async {
            let inner = ds
                .read_transaction(|| async { RouterResult::Ok(ds.resolve_target()?.kind()) })
                .await?;
            RouterResult::Ok((inner, ds.resolve_target()?.kind()))
        })
        .await
        .unwrap();

    assert!(inner.is_replica());
    assert_eq!(outer, EndpointKind::Primary);
}

#[tokio::test]
async fn test_clear_on_exit_policy_from_yaml() {
    let yaml = format!("nesting: clear_on_exit\n{}", TOPOLOGY);
    let config = RouterConfig::from_yaml_str(&yaml).unwrap();
    assert_eq!(config.nesting, NestingPolicy::ClearOnExit);

    let ds = RoutingDataSource::from_config(&config, RecordingManager::default()).unwrap();
    let after = ds
        .write_transaction(|| async {
            ds.read_transaction(|| async { RouterResult::Ok(()) }).await?;
            RouterResult::Ok(ReplicationContext::get())
        })
        .await
        .unwrap();
    assert_eq!(after, Intent::Unset);
}

#[tokio::test]
async fn test_lazy_handle_created_outside_unit() {
    let ds = data_source();
    let mut handle = ds.connection();
    let lazy = &mut handle;

    let name = ds
        .in_transaction(&TransactionConfig::read_only(), || async move {
            RouterResult::Ok(lazy.get().await?.name.clone())
        })
        .await
        .unwrap();

    assert!(name == "R1" || name == "R2");
    assert!(handle.is_bound());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_primary_is_reported() {
    let pool = PoolConfig::builder()
        .max_size(1)
        .acquisition_timeout(Duration::from_millis(50))
        .build();
    let config = RouterConfig::builder()
        .with_primary("P", "postgres://localhost:5432/app")
        .with_replica("R1", "postgres://localhost:5433/app")
        .with_pool(pool)
        .build()
        .unwrap();
    let ds = RoutingDataSource::from_config(&config, RecordingManager::default()).unwrap();

    let _held = ds.acquire_connection().await.unwrap();
    let err = ds.acquire_connection().await.unwrap_err();
    assert!(matches!(err, RouterError::PoolExhausted(_)));

    // 읽기는 여전히 레플리카에서 처리
    let name = ds
        .read_transaction(|| async { RouterResult::Ok(ds.acquire_connection().await?.name.clone()) })
        .await
        .unwrap();
    assert_eq!(name, "R1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_units_never_cross() {
    let ds = data_source();
    let mut handles = Vec::new();
    for i in 0..64 {
        let ds = ds.clone();
        handles.push(tokio::spawn(async move {
            let read_only = i % 3 != 0;
            let unit = TransactionConfig::new()
                .with_read_only(read_only)
                .with_name(format!("unit-{}", i));
            ds.in_transaction(&unit, || async {
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                    let conn = ds.acquire_connection().await?;
                    let on_replica = conn.name != "P";
                    if on_replica != read_only {
                        return Err(RouterError::context(format!(
                            "unit-{} routed to {}",
                            i, conn.name
                        )));
                    }
                }
                Ok(())
            })
            .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[test]
fn test_sample_topology_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/router.yaml");
    let config = RouterConfig::from_file(path).unwrap();

    assert_eq!(config.nesting, NestingPolicy::Restore);
    assert_eq!(config.primary().map(|p| p.name.as_str()), Some("PRIMARY"));
    assert_eq!(config.replicas().count(), 2);
    assert_eq!(config.endpoints[0].pool.acquisition_timeout, Duration::from_secs(5));
}
