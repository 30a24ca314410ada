//! 라우팅 모듈
//!
//! 읽기 전용 작업 단위는 레플리카로, 그 외는 프라이머리로 연결을 보냅니다.
//!
//! # 개요
//!
//! 연결 획득 시점마다 현재 작업 단위의 의도를 읽어 대상을 결정합니다. 레플리카는 획득마다
//! 독립적으로 균등 추첨되며, 재시도나 장애 조치는 하지 않습니다.
//!
//! # 예시
//!
//! ```ignore
//! use replica_router::router::routing::RoutingDataSource;
//! use replica_router::router::{RouterConfig, TcpConnector};
//!
//! let config = RouterConfig::from_file("router.yaml")?;
//! let ds = RoutingDataSource::from_config(&config, TcpConnector::new())?;
//! ds.open().await?;
//!
//! // 읽기 작업 단위 (레플리카로 라우팅)
//! let rows = ds.read_transaction(|| async {
//!     let conn = ds.acquire_connection().await?;
//!     RouterResult::Ok(conn.endpoint())
//! }).await?;
//!
//! ds.close();
//! ```

mod datasource;
mod registry;
mod resolver;

pub use datasource::{LazyConnection, RoutedConnection, RoutingDataSource, RoutingMetrics};
pub use registry::{Endpoint, EndpointKind, EndpointRegistry};
pub use resolver::RoutingResolver;
