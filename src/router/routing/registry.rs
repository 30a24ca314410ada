//! 엔드포인트 레지스트리
//!
//! 프라이머리 하나와 레플리카 목록으로 이루어진 고정 토폴로지를 관리합니다.
//! 생성 후에는 변경되지 않으므로 읽기에 동기화가 필요 없습니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::super::config::{EndpointConfig, Role, RouterConfig, ServerAddress};
use super::super::error::{RouterError, RouterResult};
use super::super::manager::{ConnectionManager, EndpointTarget};
use super::super::pool::{ConnectionPool, PoolMetrics};

// ============================================================================
// EndpointKind - 엔드포인트 식별자
// ============================================================================

/// 물리 엔드포인트 식별자
///
/// 레플리카 번호는 설정 순서대로 1부터 매겨집니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKind {
    /// 프라이머리
    Primary,
    /// n번째 레플리카
    Replica(u16),
}

impl EndpointKind {
    /// 레플리카 여부
    pub fn is_replica(&self) -> bool {
        matches!(self, Self::Replica(_))
    }

    /// 설정상의 역할
    pub fn role(&self) -> Role {
        match self {
            Self::Primary => Role::Primary,
            Self::Replica(_) => Role::Replica,
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("PRIMARY"),
            Self::Replica(n) => write!(f, "REPLICA_{}", n),
        }
    }
}

// ============================================================================
// Endpoint - 물리 엔드포인트
// ============================================================================

/// 풀을 가진 물리 엔드포인트
pub struct Endpoint<M: ConnectionManager> {
    kind: EndpointKind,
    pool: Arc<ConnectionPool<M>>,
}

impl<M: ConnectionManager> Endpoint<M> {
    /// 새 엔드포인트 생성
    pub fn new(kind: EndpointKind, pool: Arc<ConnectionPool<M>>) -> Self {
        Self { kind, pool }
    }

    /// 식별자
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// 설정상의 이름
    pub fn name(&self) -> &str {
        &self.pool.target().name
    }

    /// 서버 주소
    pub fn address(&self) -> &ServerAddress {
        &self.pool.target().address
    }

    /// 연결 풀
    pub fn pool(&self) -> &Arc<ConnectionPool<M>> {
        &self.pool
    }
}

impl<M: ConnectionManager> fmt::Debug for Endpoint<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("address", self.address())
            .finish()
    }
}

// ============================================================================
// EndpointRegistry - 레지스트리
// ============================================================================

/// 엔드포인트 레지스트리
pub struct EndpointRegistry<M: ConnectionManager> {
    /// 기본 엔드포인트 (항상 프라이머리)
    primary: Arc<Endpoint<M>>,
    /// 레플리카 (설정 순서)
    replicas: Vec<Arc<Endpoint<M>>>,
    /// 식별자별 조회
    lookup: HashMap<EndpointKind, Arc<Endpoint<M>>>,
}

impl<M: ConnectionManager> EndpointRegistry<M> {
    /// 설정에서 레지스트리 생성
    ///
    /// 모든 엔드포인트가 같은 매니저를 공유합니다. 풀은 만들지만 연결은 열지 않습니다.
    pub fn from_config(config: &RouterConfig, manager: Arc<M>) -> RouterResult<Self> {
        config.validate()?;

        let build = |kind: EndpointKind, endpoint: &EndpointConfig| {
            let target = EndpointTarget::from_config(endpoint)?;
            let pool = ConnectionPool::new(target, endpoint.pool.clone(), Arc::clone(&manager));
            RouterResult::Ok(Endpoint::new(kind, Arc::new(pool)))
        };

        let primary_config = config
            .primary()
            .ok_or_else(|| RouterError::configuration("No primary endpoint configured"))?;
        let primary = build(EndpointKind::Primary, primary_config)?;

        let mut replicas = Vec::new();
        for (index, endpoint) in config.replicas().enumerate() {
            let number = u16::try_from(index + 1)
                .map_err(|_| RouterError::configuration("Too many replica endpoints"))?;
            replicas.push(build(EndpointKind::Replica(number), endpoint)?);
        }

        Self::new(primary, replicas)
    }

    /// 준비된 엔드포인트로 레지스트리 생성
    pub fn new(primary: Endpoint<M>, replicas: Vec<Endpoint<M>>) -> RouterResult<Self> {
        if primary.kind() != EndpointKind::Primary {
            return Err(RouterError::configuration(format!(
                "Default endpoint must be PRIMARY, got {}",
                primary.kind()
            )));
        }
        if replicas.is_empty() {
            return Err(RouterError::configuration("At least one replica endpoint is required"));
        }

        let primary = Arc::new(primary);
        let mut lookup = HashMap::new();
        lookup.insert(EndpointKind::Primary, Arc::clone(&primary));

        // 결정기는 n번째 레플리카를 REPLICA_n으로 가리키므로 번호가 순서와 일치해야 함
        let mut shared = Vec::with_capacity(replicas.len());
        for (index, replica) in replicas.into_iter().enumerate() {
            let expected = u16::try_from(index + 1)
                .map(EndpointKind::Replica)
                .map_err(|_| RouterError::configuration("Too many replica endpoints"))?;
            if replica.kind() != expected {
                return Err(RouterError::configuration(format!(
                    "Replica at position {} must be {}, got {}",
                    index,
                    expected,
                    replica.kind()
                )));
            }
            let replica = Arc::new(replica);
            lookup.insert(expected, Arc::clone(&replica));
            shared.push(replica);
        }

        Ok(Self {
            primary,
            replicas: shared,
            lookup,
        })
    }

    /// 식별자로 엔드포인트 조회
    ///
    /// 등록되지 않은 식별자는 기본값으로 대체하지 않고 에러를 반환합니다.
    pub fn resolve(&self, kind: EndpointKind) -> RouterResult<&Arc<Endpoint<M>>> {
        self.lookup
            .get(&kind)
            .ok_or_else(|| RouterError::configuration(format!("Unknown endpoint {}", kind)))
    }

    /// 프라이머리
    pub fn primary(&self) -> &Arc<Endpoint<M>> {
        &self.primary
    }

    /// 레플리카 목록
    pub fn replicas(&self) -> &[Arc<Endpoint<M>>] {
        &self.replicas
    }

    /// 레플리카 수 (항상 1 이상)
    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// 인덱스로 레플리카 조회 (0부터)
    pub fn replica_at(&self, index: usize) -> Option<&Arc<Endpoint<M>>> {
        self.replicas.get(index)
    }

    /// 모든 엔드포인트 (프라이머리 먼저)
    pub fn endpoints(&self) -> impl Iterator<Item = &Arc<Endpoint<M>>> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }

    /// 워밍업이 설정된 풀 열기
    pub async fn open(&self) -> RouterResult<()> {
        for endpoint in self.endpoints() {
            if let Some(count) = endpoint.pool().warmup_if_enabled().await? {
                tracing::info!(
                    endpoint = endpoint.name(),
                    kind = %endpoint.kind(),
                    warmed = count,
                    "connection pool warmed up"
                );
            }
        }
        Ok(())
    }

    /// 모든 풀 정리 후 닫기
    pub fn close(&self) {
        for endpoint in self.endpoints() {
            endpoint.pool().close();
        }
    }

    /// 엔드포인트별 풀 메트릭
    pub fn pool_metrics(&self) -> Vec<(EndpointKind, PoolMetrics)> {
        self.endpoints()
            .map(|endpoint| (endpoint.kind(), endpoint.pool().metrics()))
            .collect()
    }
}

impl<M: ConnectionManager> fmt::Debug for EndpointRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("primary", &self.primary)
            .field("replicas", &self.replicas)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::manager::testing::MockManager;
    use crate::router::pool::PoolConfig;

    fn sample_config() -> RouterConfig {
        RouterConfig::builder()
            .with_primary("primary", "postgres://localhost:5432/dbexample")
            .with_replica("replica1", "postgres://localhost:5433/dbexample")
            .with_replica("replica2", "postgres://localhost:5434/dbexample")
            .build()
            .unwrap()
    }

    fn endpoint(kind: EndpointKind, name: &str) -> Endpoint<MockManager> {
        let target = EndpointTarget::new(name, ServerAddress::new("localhost", 5432));
        let pool = ConnectionPool::new(target, PoolConfig::default(), Arc::new(MockManager::new()));
        Endpoint::new(kind, Arc::new(pool))
    }

    #[test]
    fn test_endpoint_kind_display_and_role() {
        assert_eq!(EndpointKind::Primary.to_string(), "PRIMARY");
        assert_eq!(EndpointKind::Replica(2).to_string(), "REPLICA_2");

        assert!(EndpointKind::Replica(1).is_replica());
        assert_eq!(EndpointKind::Primary.role(), Role::Primary);
        assert_eq!(EndpointKind::Replica(3).role(), Role::Replica);
    }

    #[test]
    fn test_from_config() {
        let registry = EndpointRegistry::from_config(&sample_config(), Arc::new(MockManager::new())).unwrap();

        assert_eq!(registry.primary().kind(), EndpointKind::Primary);
        assert_eq!(registry.primary().name(), "primary");
        assert_eq!(registry.replica_count(), 2);
        assert_eq!(registry.replica_at(0).unwrap().kind(), EndpointKind::Replica(1));
        assert_eq!(registry.replica_at(1).unwrap().name(), "replica2");
        assert_eq!(registry.replica_at(1).unwrap().address().port, 5434);
        assert!(registry.replica_at(2).is_none());
        assert_eq!(registry.endpoints().count(), 3);
    }

    #[test]
    fn test_resolve() {
        let registry = EndpointRegistry::from_config(&sample_config(), Arc::new(MockManager::new())).unwrap();

        assert_eq!(registry.resolve(EndpointKind::Primary).unwrap().name(), "primary");
        assert_eq!(registry.resolve(EndpointKind::Replica(2)).unwrap().name(), "replica2");
    }

    #[test]
    fn test_resolve_unknown_kind() {
        let registry = EndpointRegistry::from_config(&sample_config(), Arc::new(MockManager::new())).unwrap();

        let err = registry.resolve(EndpointKind::Replica(3)).unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
        assert!(err.to_string().contains("REPLICA_3"));
    }

    #[test]
    fn test_from_invalid_config() {
        let config = RouterConfig {
            endpoints: vec![sample_config().endpoints[0].clone()],
            ..Default::default()
        };
        let result = EndpointRegistry::from_config(&config, Arc::new(MockManager::new()));
        assert!(matches!(result, Err(RouterError::Configuration(_))));
    }

    #[test]
    fn test_new_rejects_bad_topology() {
        let result = EndpointRegistry::new(
            endpoint(EndpointKind::Replica(1), "r1"),
            vec![endpoint(EndpointKind::Replica(2), "r2")],
        );
        assert!(result.is_err());

        let result = EndpointRegistry::new(endpoint(EndpointKind::Primary, "p"), vec![]);
        assert!(result.is_err());

        let result = EndpointRegistry::new(
            endpoint(EndpointKind::Primary, "p"),
            vec![endpoint(EndpointKind::Primary, "p2")],
        );
        assert!(result.is_err());

        let result = EndpointRegistry::new(
            endpoint(EndpointKind::Primary, "p"),
            vec![
                endpoint(EndpointKind::Replica(1), "r1"),
                endpoint(EndpointKind::Replica(1), "r1b"),
            ],
        );
        assert!(result.is_err());

        let result = EndpointRegistry::new(
            endpoint(EndpointKind::Primary, "p"),
            vec![endpoint(EndpointKind::Replica(2), "r2")],
        );
        assert!(result.is_err());

        let registry = EndpointRegistry::new(
            endpoint(EndpointKind::Primary, "p"),
            vec![
                endpoint(EndpointKind::Replica(1), "r1"),
                endpoint(EndpointKind::Replica(2), "r2"),
            ],
        )
        .unwrap();
        assert_eq!(registry.replica_count(), 2);
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let warm = PoolConfig::builder().max_size(4).with_warmup_size(2).build();
        let config = RouterConfig::builder()
            .with_primary("primary", "db0:5432")
            .with_replica("replica1", "db1:5432")
            .with_pool(warm)
            .build()
            .unwrap();
        let manager = Arc::new(MockManager::new());
        let registry = EndpointRegistry::from_config(&config, Arc::clone(&manager)).unwrap();

        registry.open().await.unwrap();
        assert_eq!(manager.connect_count(), 4);
        for (_, metrics) in registry.pool_metrics() {
            assert_eq!(metrics.idle, 2);
        }

        registry.close();
        for endpoint in registry.endpoints() {
            assert!(!endpoint.pool().is_open());
            assert_eq!(endpoint.pool().idle_count(), 0);
        }
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EndpointRegistry<MockManager>>();
    }
}
