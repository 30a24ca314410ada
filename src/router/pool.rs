//! Connection Pool
//!
//! 엔드포인트별 연결 풀링

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::{RouterError, RouterResult};
use super::manager::{ConnectionManager, EndpointTarget};

// ============================================================================
// PoolConfig - 풀 설정
// ============================================================================

/// 연결 풀 설정
///
/// # 필드
///
/// | 필드 | 기본값 | 설명 |
/// |------|--------|------|
/// | `max_size` | 10 | 동시에 대여 가능한 최대 연결 수 |
/// | `min_idle` | 0 | 워밍업 시 기본 유휴 연결 수 |
/// | `warmup_on_init` | false | 레지스트리 open 시 워밍업 여부 |
/// | `warmup_size` | 0 | 워밍업 연결 수 (0이면 min_idle 사용) |
/// | `max_lifetime` | 30분 | 연결 최대 수명 |
/// | `idle_timeout` | 10분 | 유휴 타임아웃 |
/// | `connection_timeout` | 30초 | 새 연결 생성 타임아웃 |
/// | `acquisition_timeout` | 30초 | 풀 슬롯 대기 타임아웃 |
///
/// YAML에서는 기간을 `30s`, `5m` 같은 문자열로 씁니다.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 최대 연결 수
    pub max_size: usize,
    /// 최소 유휴 연결 수
    pub min_idle: usize,
    /// 초기화 시 워밍업 수행 여부
    pub warmup_on_init: bool,
    /// 워밍업 시 생성할 연결 수 (0이면 min_idle 사용)
    pub warmup_size: usize,
    /// 연결 최대 수명
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,
    /// 유휴 타임아웃
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// 연결 타임아웃
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
    /// 획득 타임아웃
    #[serde(with = "humantime_serde")]
    pub acquisition_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 0,
            warmup_on_init: false,
            warmup_size: 0,
            max_lifetime: Duration::from_secs(1800),
            idle_timeout: Duration::from_secs(600),
            connection_timeout: Duration::from_secs(30),
            acquisition_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// 빌더 패턴으로 풀 설정 생성
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// 워밍업 목표 연결 수
    fn warmup_target(&self, requested: usize) -> usize {
        let target = if requested > 0 {
            requested
        } else if self.warmup_size > 0 {
            self.warmup_size
        } else {
            self.min_idle
        };
        target.min(self.max_size)
    }
}

/// 풀 설정 빌더
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// 최대 연결 수 설정
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// 최소 유휴 연결 수 설정
    pub fn min_idle(mut self, size: usize) -> Self {
        self.config.min_idle = size;
        self
    }

    /// 워밍업 활성화 (min_idle 개수만큼)
    pub fn with_warmup(mut self) -> Self {
        self.config.warmup_on_init = true;
        self
    }

    /// 워밍업 활성화 (지정 개수)
    pub fn with_warmup_size(mut self, size: usize) -> Self {
        self.config.warmup_on_init = true;
        self.config.warmup_size = size;
        self
    }

    /// 연결 최대 수명 설정
    pub fn max_lifetime(mut self, duration: Duration) -> Self {
        self.config.max_lifetime = duration;
        self
    }

    /// 유휴 타임아웃 설정
    pub fn idle_timeout(mut self, duration: Duration) -> Self {
        self.config.idle_timeout = duration;
        self
    }

    /// 연결 타임아웃 설정
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// 획득 타임아웃 설정
    pub fn acquisition_timeout(mut self, duration: Duration) -> Self {
        self.config.acquisition_timeout = duration;
        self
    }

    /// 설정 빌드
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

// ============================================================================
// IdleConnection - 유휴 연결
// ============================================================================

struct IdleConnection<C> {
    id: u64,
    conn: C,
    created_at: Instant,
    last_used: Instant,
}

impl<C> IdleConnection<C> {
    fn is_fresh(&self, config: &PoolConfig) -> bool {
        self.created_at.elapsed() <= config.max_lifetime
            && self.last_used.elapsed() <= config.idle_timeout
    }
}

// ============================================================================
// PooledConnection - 대여된 연결
// ============================================================================

/// 풀에서 대여된 연결
///
/// drop 시 풀로 반환됩니다. 풀 슬롯(permit)도 함께 반납됩니다.
pub struct PooledConnection<M: ConnectionManager> {
    id: u64,
    conn: Option<M::Connection>,
    created_at: Instant,
    broken: bool,
    pool: Arc<ConnectionPool<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: ConnectionManager> PooledConnection<M> {
    /// 연결 ID (풀 안에서 고유)
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 생성 시간
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// 대상 엔드포인트 이름
    pub fn endpoint_name(&self) -> &str {
        &self.pool.target.name
    }

    /// 반환하지 않고 폐기하도록 표시
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl<M: ConnectionManager> std::fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("endpoint", &self.pool.target.name)
            .field("age", &self.created_at.elapsed())
            .field("broken", &self.broken)
            .finish()
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let idle = IdleConnection {
                id: self.id,
                conn,
                created_at: self.created_at,
                last_used: Instant::now(),
            };
            self.pool.return_connection(idle, self.broken);
        }
    }
}

// ============================================================================
// PoolMetrics - 풀 메트릭
// ============================================================================

/// 풀 메트릭
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// 현재 크기 (유휴 + 사용 중)
    pub size: usize,
    /// 유휴 연결 수
    pub idle: usize,
    /// 사용 중인 연결 수
    pub in_use: usize,
    /// 총 획득 횟수
    pub total_acquisitions: u64,
    /// 총 생성 횟수
    pub total_created: u64,
    /// 총 닫힌 연결 수
    pub total_closed: u64,
    /// 총 획득 타임아웃 횟수
    pub total_timeouts: u64,
}

// ============================================================================
// ConnectionPool - 연결 풀
// ============================================================================

/// 연결 풀
///
/// 세마포어가 동시 대여 수를 `max_size`로 제한합니다. 슬롯 대기가 `acquisition_timeout`을
/// 넘기면 [`RouterError::PoolExhausted`], 새 연결 생성이 `connection_timeout`을 넘기면
/// [`RouterError::ConnectionTimeout`]을 반환합니다.
pub struct ConnectionPool<M: ConnectionManager> {
    /// 연결 대상
    target: EndpointTarget,
    /// 풀 설정
    config: PoolConfig,
    /// 연결 생성기
    manager: Arc<M>,
    /// 유휴 연결들
    idle_connections: Mutex<VecDeque<IdleConnection<M::Connection>>>,
    /// 세마포어 (연결 수 제한)
    semaphore: Arc<Semaphore>,
    /// 현재 크기
    size: AtomicUsize,
    /// 사용 중인 연결 수
    in_use: AtomicUsize,
    /// 총 생성 횟수
    total_created: AtomicU64,
    /// 총 획득 횟수
    total_acquisitions: AtomicU64,
    /// 총 닫힌 횟수
    total_closed: AtomicU64,
    /// 총 타임아웃 횟수
    total_timeouts: AtomicU64,
    /// 다음 연결 ID
    next_id: AtomicU64,
    /// 열린 상태
    open: RwLock<bool>,
}

impl<M: ConnectionManager> ConnectionPool<M> {
    /// 새 연결 풀 생성
    ///
    /// 연결은 만들지 않습니다. 워밍업은 [`warmup`](Self::warmup)으로 따로 수행합니다.
    pub fn new(target: EndpointTarget, config: PoolConfig, manager: Arc<M>) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size));

        Self {
            target,
            config,
            manager,
            idle_connections: Mutex::new(VecDeque::new()),
            semaphore,
            size: AtomicUsize::new(0),
            in_use: AtomicUsize::new(0),
            total_created: AtomicU64::new(0),
            total_acquisitions: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            open: RwLock::new(true),
        }
    }

    /// 연결 획득
    pub async fn acquire(self: &Arc<Self>) -> RouterResult<PooledConnection<M>> {
        self.ensure_open()?;

        let permit = tokio::time::timeout(
            self.config.acquisition_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        .map_err(|_| {
            self.total_timeouts.fetch_add(1, Ordering::Relaxed);
            RouterError::pool_exhausted(format!(
                "'{}' had no free connection within {:?} (max_size {})",
                self.target.name, self.config.acquisition_timeout, self.config.max_size
            ))
        })?
        .map_err(|_| RouterError::pool(format!("Pool '{}' is closed", self.target.name)))?;

        let (id, conn, created_at) = match self.get_idle_connection() {
            Some(idle) => (idle.id, idle.conn, idle.created_at),
            None => {
                let conn = self.create_connection().await?;
                (self.next_id.fetch_add(1, Ordering::Relaxed), conn, Instant::now())
            }
        };

        self.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.in_use.fetch_add(1, Ordering::Relaxed);

        Ok(PooledConnection {
            id,
            conn: Some(conn),
            created_at,
            broken: false,
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// 유휴 연결 가져오기
    fn get_idle_connection(&self) -> Option<IdleConnection<M::Connection>> {
        let mut idle = self.idle_connections.lock();

        while let Some(conn) = idle.pop_front() {
            if conn.is_fresh(&self.config) && self.manager.is_valid(&conn.conn) {
                return Some(conn);
            }
            // 만료되었거나 끊어진 연결은 버림
            self.discard(conn);
        }

        None
    }

    /// 새 연결 생성
    async fn create_connection(&self) -> RouterResult<M::Connection> {
        let conn = tokio::time::timeout(
            self.config.connection_timeout,
            self.manager.connect(&self.target),
        )
        .await
        .map_err(|_| {
            RouterError::connection_timeout(format!(
                "'{}' at {} did not connect within {:?}",
                self.target.name, self.target.address, self.config.connection_timeout
            ))
        })??;

        self.size.fetch_add(1, Ordering::Relaxed);
        self.total_created.fetch_add(1, Ordering::Relaxed);

        Ok(conn)
    }

    /// 연결 반환
    fn return_connection(&self, conn: IdleConnection<M::Connection>, broken: bool) {
        self.in_use.fetch_sub(1, Ordering::Relaxed);

        // close()의 쓰기 잠금과 직렬화되도록 반환이 끝날 때까지 읽기 잠금 유지
        let open = self.open.read();
        let reusable = *open
            && !broken
            && conn.is_fresh(&self.config)
            && self.manager.is_valid(&conn.conn);

        if reusable {
            self.idle_connections.lock().push_back(conn);
        } else {
            drop(open);
            self.discard(conn);
        }
    }

    fn discard(&self, conn: IdleConnection<M::Connection>) {
        drop(conn);
        self.size.fetch_sub(1, Ordering::Relaxed);
        self.total_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// 풀 닫기 (유휴 연결 정리, 대기 중인 획득은 실패)
    ///
    /// 대여 중인 연결은 반환되는 시점에 닫힙니다. 정리한 유휴 연결 수를 반환합니다.
    pub fn close(&self) -> usize {
        {
            let mut open = self.open.write();
            if !*open {
                return 0;
            }
            *open = false;
        }
        self.semaphore.close();

        let drained: Vec<_> = self.idle_connections.lock().drain(..).collect();
        let count = drained.len();
        for conn in drained {
            self.discard(conn);
        }

        tracing::info!(endpoint = %self.target.name, drained = count, "connection pool closed");
        count
    }

    /// 연결 풀 워밍업
    ///
    /// 풀 전체 크기(대여 중 포함)가 목표에 이를 때까지 연결을 미리 생성하여 유휴 상태로
    /// 둡니다. `count`가 0이면 `warmup_size`, 그것도 0이면 `min_idle`을 사용합니다.
    /// 생성마다 대여와 같은 슬롯을 잡으므로 `max_size`를 넘지 않습니다.
    /// 첫 연결부터 실패하면 에러, 일부만 실패하면 경고 후 생성된 수를 반환합니다.
    pub async fn warmup(&self, count: usize) -> RouterResult<usize> {
        self.ensure_open()?;

        let target = self.config.warmup_target(count);
        let mut created = 0;
        while self.size() < target {
            let Ok(_permit) = self.semaphore.try_acquire() else {
                break;
            };
            match self.create_connection().await {
                Ok(conn) => {
                    let now = Instant::now();
                    self.idle_connections.lock().push_back(IdleConnection {
                        id: self.next_id.fetch_add(1, Ordering::Relaxed),
                        conn,
                        created_at: now,
                        last_used: now,
                    });
                    created += 1;
                }
                Err(e) => {
                    tracing::warn!(endpoint = %self.target.name, "warmup connection failed: {}", e);
                    if created == 0 {
                        return Err(e);
                    }
                    break;
                }
            }
        }

        Ok(created)
    }

    /// 설정에 따른 자동 워밍업
    ///
    /// - `Ok(Some(n))`: n개 연결 워밍업 완료
    /// - `Ok(None)`: 워밍업 비활성화됨
    pub async fn warmup_if_enabled(&self) -> RouterResult<Option<usize>> {
        if !self.config.warmup_on_init {
            return Ok(None);
        }

        let count = self.warmup(0).await?;
        Ok(Some(count))
    }

    fn ensure_open(&self) -> RouterResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(RouterError::pool(format!("Pool '{}' is closed", self.target.name)))
        }
    }

    /// 메트릭 조회
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            size: self.size(),
            idle: self.idle_count(),
            in_use: self.in_use_count(),
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 대상 정보
    pub fn target(&self) -> &EndpointTarget {
        &self.target
    }

    /// 풀 설정
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 열린 상태 여부
    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// 풀 크기
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// 유휴 연결 수
    pub fn idle_count(&self) -> usize {
        self.idle_connections.lock().len()
    }

    /// 사용 중인 연결 수
    pub fn in_use_count(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }
}

impl<M: ConnectionManager> std::fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoint", &self.target.name)
            .field("address", &self.target.address)
            .field("size", &self.size())
            .field("idle", &self.idle_count())
            .field("in_use", &self.in_use_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
