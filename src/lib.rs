//! # Replica Router
//!
//! A replication-aware connection router for primary/replica database topologies.
//!
//! ## Features
//!
//! - **Read/Write Splitting** - Read-only units of work go to replicas, everything else to the primary
//! - **Per-Unit Intent** - Intent is scoped to the running unit of work and never leaks across tasks
//! - **Lazy Binding** - Connection handles pick their endpoint at first use, not at creation
//! - **Connection Pooling** - One bounded pool per endpoint with configurable sizes and timeouts
//! - **Declarative Topology** - Endpoints and pools loaded from YAML with `${VAR:-default}` expansion
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! replica-router = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use replica_router::{RouterConfig, RouterResult, RoutingDataSource, TcpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Describe the topology
//!     let config = RouterConfig::builder()
//!         .with_primary("PRIMARY", "postgres://db-primary:5432/app")
//!         .with_replica("REPLICA_1", "postgres://db-replica-1:5432/app")
//!         .with_replica("REPLICA_2", "postgres://db-replica-2:5432/app")
//!         .build()?;
//!
//!     // Create the data source
//!     let ds = RoutingDataSource::from_config(&config, TcpConnector::new())?;
//!     ds.open().await?;
//!
//!     // Read-only unit of work (routed to a replica)
//!     let endpoint = ds
//!         .read_transaction(|| async {
//!             let conn = ds.acquire_connection().await?;
//!             RouterResult::Ok(conn.endpoint())
//!         })
//!         .await?;
//!     println!("read served by {}", endpoint);
//!
//!     // Clean up
//!     ds.close();
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Units of Work
//!
//! Any unit can be described with a [`TransactionConfig`]. Only the `read_only`
//! flag decides the intent:
//!
//! ```rust,no_run
//! # use replica_router::{RouterResult, RoutingDataSource, TcpConnector, TransactionConfig};
//! # use std::time::Duration;
//! # async fn example(ds: RoutingDataSource<TcpConnector>) -> RouterResult<()> {
//! let unit = TransactionConfig::read_only()
//!     .with_name("monthlyReport")
//!     .with_timeout(Duration::from_secs(30));
//!
//! ds.in_transaction(&unit, || async {
//!     // Handle created here, endpoint chosen at first use
//!     let mut conn = ds.connection();
//!     let routed = conn.get().await?;
//!     assert!(routed.endpoint().is_replica());
//!     RouterResult::Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Load the topology from YAML:
//!
//! ```rust
//! use replica_router::RouterConfig;
//!
//! let config = RouterConfig::from_yaml_str(r#"
//! endpoints:
//!   - name: PRIMARY
//!     role: primary
//!     url: postgres://db-primary:5432/app
//!   - name: REPLICA_1
//!     role: replica
//!     url: postgres://db-replica-1:5432/app
//!     pool:
//!       max_size: 20
//!       acquisition_timeout: 5s
//! "#).unwrap();
//!
//! assert_eq!(config.replicas().count(), 1);
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`RouterResult`]. Pool errors reach the caller unchanged:
//!
//! ```rust,no_run
//! # use replica_router::{RouterError, RoutingDataSource, TcpConnector};
//! # async fn example(ds: RoutingDataSource<TcpConnector>) {
//! match ds.acquire_connection().await {
//!     Ok(conn) => println!("connected to {}", conn.endpoint()),
//!     Err(RouterError::PoolExhausted(msg)) => eprintln!("pool busy: {}", msg),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`router`] - Intent context, interceptor, pools and routing data source
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod router;

// Re-exports for convenience
pub use router::{
    ConnectionManager, ConnectionPool, EndpointConfig, EndpointTarget, Intent,
    IntentInterceptor, NestingPolicy, PoolConfig, PoolMetrics, ReplicationContext,
    Role, RouterConfig, RouterConfigBuilder, RouterError, RouterResult,
    ServerAddress, TcpConnector, TransactionConfig,
};

pub use router::routing::{
    EndpointKind, EndpointRegistry, LazyConnection, RoutedConnection, RoutingDataSource,
    RoutingMetrics, RoutingResolver,
};
