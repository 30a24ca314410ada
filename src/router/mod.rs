//! Router Module
//!
//! 복제 인지 연결 라우터
//!
//! # Components
//!
//! - 작업 단위 의도 (ReplicationContext, Intent)
//! - 작업 단위 경계 (IntentInterceptor, TransactionConfig, NestingPolicy)
//! - 엔드포인트별 연결 풀 (ConnectionPool, PoolConfig)
//! - 연결 생성 (ConnectionManager, TcpConnector)
//! - 라우팅 (RoutingDataSource, EndpointRegistry, RoutingResolver)
//! - 설정 (RouterConfig, EndpointConfig)
//!
//! # Example
//!
//! ```ignore
//! use replica_router::router::{RouterConfig, TcpConnector, TransactionConfig};
//! use replica_router::router::routing::RoutingDataSource;
//!
//! let config = RouterConfig::builder()
//!     .with_primary("PRIMARY", "postgres://db-primary:5432/app")
//!     .with_replica("REPLICA_1", "postgres://db-replica-1:5432/app")
//!     .with_replica("REPLICA_2", "postgres://db-replica-2:5432/app")
//!     .build()?;
//!
//! let ds = RoutingDataSource::from_config(&config, TcpConnector::new())?;
//!
//! // 쓰기 작업 단위 (프라이머리)
//! ds.write_transaction(|| async {
//!     let conn = ds.acquire_connection().await?;
//!     RouterResult::Ok(())
//! }).await?;
//!
//! // 설명자로 실행
//! let unit = TransactionConfig::read_only().with_name("findAllUsers");
//! ds.in_transaction(&unit, || async {
//!     let mut conn = ds.connection();
//!     let replica = conn.get().await?;
//!     RouterResult::Ok(())
//! }).await?;
//! ```

pub mod routing;
mod config;
mod context;
mod error;
mod manager;
mod pool;
mod transaction;

// Re-exports
pub use config::{
    expand_env_vars, Credentials, EndpointConfig, Role, RouterConfig, RouterConfigBuilder,
    ServerAddress, DEFAULT_PORT,
};
pub use context::{Intent, ReplicationContext};
pub use error::{RouterError, RouterResult};
pub use manager::{ConnectionManager, EndpointTarget, TcpConnector};
pub use pool::{ConnectionPool, PoolConfig, PoolConfigBuilder, PoolMetrics, PooledConnection};
pub use transaction::{IntentInterceptor, NestingPolicy, TransactionConfig};
