//! 라우팅 데이터 소스
//!
//! 연결 획득의 단일 진입점입니다. 획득할 때마다 현재 작업 단위의 의도를 읽어
//! 대상 엔드포인트를 정하고 그 풀에 위임합니다.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::super::config::RouterConfig;
use super::super::context::ReplicationContext;
use super::super::error::{RouterError, RouterResult};
use super::super::manager::ConnectionManager;
use super::super::pool::{PoolMetrics, PooledConnection};
use super::super::transaction::{IntentInterceptor, NestingPolicy, TransactionConfig};
use super::registry::{Endpoint, EndpointKind, EndpointRegistry};
use super::resolver::RoutingResolver;

// ============================================================================
// RoutedConnection - 라우팅된 연결
// ============================================================================

/// 대상 엔드포인트가 기록된 대여 연결
pub struct RoutedConnection<M: ConnectionManager> {
    kind: EndpointKind,
    conn: PooledConnection<M>,
}

impl<M: ConnectionManager> RoutedConnection<M> {
    /// 연결이 온 엔드포인트
    pub fn endpoint(&self) -> EndpointKind {
        self.kind
    }

    /// 풀 연결 참조
    pub fn pooled(&self) -> &PooledConnection<M> {
        &self.conn
    }
}

impl<M: ConnectionManager> Deref for RoutedConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<M: ConnectionManager> DerefMut for RoutedConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl<M: ConnectionManager> fmt::Debug for RoutedConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedConnection")
            .field("endpoint", &self.kind)
            .field("conn", &self.conn)
            .finish()
    }
}

/// 현재 의도로 엔드포인트를 정하고 연결 획득
async fn route_and_acquire<M: ConnectionManager>(
    registry: &EndpointRegistry<M>,
    resolver: &RoutingResolver,
) -> RouterResult<RoutedConnection<M>> {
    let endpoint = resolve_endpoint(registry, resolver)?;
    let kind = endpoint.kind();
    let conn = endpoint.pool().acquire().await?;
    Ok(RoutedConnection { kind, conn })
}

fn resolve_endpoint<'a, M: ConnectionManager>(
    registry: &'a EndpointRegistry<M>,
    resolver: &RoutingResolver,
) -> RouterResult<&'a Arc<Endpoint<M>>> {
    let intent = ReplicationContext::get();
    let kind = resolver.decide(intent, registry);
    registry.resolve(kind)
}

// ============================================================================
// LazyConnection - 지연 연결
// ============================================================================

/// 처음 사용할 때 라우팅되는 연결 핸들
///
/// 생성 시에는 아무 I/O도 하지 않습니다. 첫 [`get`](Self::get) 호출 시점의 의도로 대상을
/// 정하고 연결을 획득하며, 이후 호출은 같은 연결을 돌려줍니다. 한 번도 쓰지 않은 핸들은
/// 연결을 잡지 않습니다.
pub struct LazyConnection<M: ConnectionManager> {
    registry: Arc<EndpointRegistry<M>>,
    resolver: RoutingResolver,
    bound: Option<RoutedConnection<M>>,
}

impl<M: ConnectionManager> LazyConnection<M> {
    /// 연결 획득 (처음 한 번만 라우팅)
    pub async fn get(&mut self) -> RouterResult<&mut RoutedConnection<M>> {
        let conn = match self.bound.take() {
            Some(conn) => conn,
            None => route_and_acquire(&self.registry, &self.resolver).await?,
        };
        Ok(self.bound.insert(conn))
    }

    /// 이미 연결이 묶였는지 여부
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// 묶인 엔드포인트
    pub fn endpoint(&self) -> Option<EndpointKind> {
        self.bound.as_ref().map(RoutedConnection::endpoint)
    }

    /// 연결을 풀로 돌려주고 다시 미결정 상태로
    ///
    /// 다음 `get`은 그 시점의 의도로 새로 라우팅합니다.
    pub fn release(&mut self) {
        self.bound = None;
    }
}

impl<M: ConnectionManager> fmt::Debug for LazyConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyConnection")
            .field("bound", &self.endpoint())
            .finish()
    }
}

// ============================================================================
// RoutingDataSource - 라우팅 데이터 소스
// ============================================================================

/// 라우팅 데이터 소스
///
/// 재시도나 장애 조치는 하지 않습니다. 풀 에러는 그대로 호출자에게 전달됩니다.
pub struct RoutingDataSource<M: ConnectionManager> {
    /// 엔드포인트 레지스트리
    registry: Arc<EndpointRegistry<M>>,
    /// 라우팅 결정기
    resolver: RoutingResolver,
    /// 작업 단위 인터셉터
    interceptor: IntentInterceptor,
}

impl<M: ConnectionManager> RoutingDataSource<M> {
    /// 레지스트리로 데이터 소스 생성
    pub fn new(registry: EndpointRegistry<M>) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver: RoutingResolver::new(),
            interceptor: IntentInterceptor::default(),
        }
    }

    /// 설정으로 데이터 소스 생성
    ///
    /// 설정 검증에 실패하면 트래픽을 받기 전에 에러를 반환합니다.
    pub fn from_config(config: &RouterConfig, manager: M) -> RouterResult<Self> {
        let registry = EndpointRegistry::from_config(config, Arc::new(manager))?;
        Ok(Self::new(registry).with_nesting(config.nesting))
    }

    /// 중첩 처리 방식 설정
    pub fn with_nesting(mut self, nesting: NestingPolicy) -> Self {
        self.interceptor = IntentInterceptor::new(nesting);
        self
    }

    /// 워밍업이 설정된 풀 열기
    pub async fn open(&self) -> RouterResult<()> {
        self.registry.open().await
    }

    /// 현재 의도로 대상 엔드포인트 결정 (연결은 획득하지 않음)
    pub fn resolve_target(&self) -> RouterResult<&Arc<Endpoint<M>>> {
        resolve_endpoint(&self.registry, &self.resolver)
    }

    /// 현재 의도에 맞는 엔드포인트에서 연결 획득
    pub async fn acquire_connection(&self) -> RouterResult<RoutedConnection<M>> {
        route_and_acquire(&self.registry, &self.resolver).await
    }

    /// 지연 연결 핸들 생성
    pub fn connection(&self) -> LazyConnection<M> {
        LazyConnection {
            registry: Arc::clone(&self.registry),
            resolver: self.resolver,
            bound: None,
        }
    }

    /// 읽기 전용 작업 단위 실행
    pub async fn read_transaction<F, Fut, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        self.interceptor.run(&TransactionConfig::read_only(), body).await
    }

    /// 읽기/쓰기 작업 단위 실행
    pub async fn write_transaction<F, Fut, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        self.interceptor.run(&TransactionConfig::read_write(), body).await
    }

    /// 설명자로 작업 단위 실행
    pub async fn in_transaction<F, Fut, T, E>(&self, unit: &TransactionConfig, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        self.interceptor.run(unit, body).await
    }

    /// 인터셉터
    pub fn interceptor(&self) -> &IntentInterceptor {
        &self.interceptor
    }

    /// 레지스트리
    pub fn registry(&self) -> &Arc<EndpointRegistry<M>> {
        &self.registry
    }

    /// 모든 풀 닫기
    pub fn close(&self) {
        self.registry.close();
    }

    /// 데이터 소스 메트릭
    pub fn metrics(&self) -> RoutingMetrics {
        let endpoints = self.registry.pool_metrics();

        let mut metrics = RoutingMetrics {
            pool_count: endpoints.len(),
            ..Default::default()
        };
        for (_, m) in &endpoints {
            metrics.total_pool_size += m.size;
            metrics.total_idle_connections += m.idle;
            metrics.total_in_use_connections += m.in_use;
        }
        metrics.endpoints = endpoints;
        metrics
    }
}

impl<M: ConnectionManager> Clone for RoutingDataSource<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            resolver: self.resolver,
            interceptor: self.interceptor,
        }
    }
}

impl<M: ConnectionManager> fmt::Debug for RoutingDataSource<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingDataSource")
            .field("registry", &self.registry)
            .field("nesting", &self.interceptor.nesting())
            .finish()
    }
}

/// 데이터 소스 메트릭
#[derive(Debug, Clone, Default)]
pub struct RoutingMetrics {
    /// 연결 풀 수
    pub pool_count: usize,
    /// 전체 풀 크기
    pub total_pool_size: usize,
    /// 전체 유휴 연결 수
    pub total_idle_connections: usize,
    /// 전체 사용 중인 연결 수
    pub total_in_use_connections: usize,
    /// 엔드포인트별 메트릭
    pub endpoints: Vec<(EndpointKind, PoolMetrics)>,
}

// ============================================================================
// Tests
// ============================================================================
