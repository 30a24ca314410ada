//! Connection Manager
//!
//! 물리 연결을 여는 협력자 인터페이스
//!
//! 라우터는 드라이버 프로토콜을 구현하지 않습니다. 실제 연결 생성은
//! [`ConnectionManager`] 구현체에 위임하고, 풀은 그 결과를 재사용만 합니다.

use std::future::Future;

use tokio::net::TcpStream;

use super::config::{Credentials, EndpointConfig, ServerAddress};
use super::error::{RouterError, RouterResult};

// ============================================================================
// EndpointTarget - 연결 대상
// ============================================================================

/// 매니저에게 전달되는 연결 대상 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTarget {
    /// 엔드포인트 이름
    pub name: String,
    /// 서버 주소
    pub address: ServerAddress,
    /// 데이터베이스 이름
    pub database: Option<String>,
    /// 인증 정보
    pub credentials: Credentials,
}

impl EndpointTarget {
    /// 새 대상 생성
    pub fn new(name: impl Into<String>, address: ServerAddress) -> Self {
        Self {
            name: name.into(),
            address,
            database: None,
            credentials: Credentials::default(),
        }
    }

    /// 설명자에서 대상 생성
    pub fn from_config(config: &EndpointConfig) -> RouterResult<Self> {
        let (address, database) = ServerAddress::parse_url(&config.url)?;
        Ok(Self {
            name: config.name.clone(),
            address,
            database,
            credentials: config.credentials.clone(),
        })
    }
}

// ============================================================================
// ConnectionManager - 연결 생성 협력자
// ============================================================================

/// 물리 연결 생성기
///
/// 풀은 엔드포인트마다 같은 매니저를 공유하며, `connect`는 동시에 여러 번 호출될 수 있습니다.
pub trait ConnectionManager: Send + Sync + 'static {
    /// 물리 연결 타입
    type Connection: Send + 'static;

    /// 대상에 새 연결 생성
    fn connect(
        &self,
        target: &EndpointTarget,
    ) -> impl Future<Output = RouterResult<Self::Connection>> + Send;

    /// 유휴 연결 재사용 전 검사
    fn is_valid(&self, _conn: &Self::Connection) -> bool {
        true
    }
}

// ============================================================================
// TcpConnector - TCP 연결
// ============================================================================

/// TCP 스트림을 여는 기본 매니저
///
/// 핸드셰이크는 하지 않습니다. 도달 가능성 확인이나 드라이버의 전송 계층으로 씁니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    /// 새 커넥터 생성
    pub fn new() -> Self {
        Self
    }
}

impl ConnectionManager for TcpConnector {
    type Connection = TcpStream;

    async fn connect(&self, target: &EndpointTarget) -> RouterResult<TcpStream> {
        let stream = TcpStream::connect(target.address.to_socket_addr())
            .await
            .map_err(|e| {
                RouterError::connection(format!(
                    "Failed to connect to '{}' at {}: {}",
                    target.name, target.address, e
                ))
            })?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn is_valid(&self, conn: &TcpStream) -> bool {
        conn.peer_addr().is_ok()
    }
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::config::Role;

    #[test]
    fn test_target_from_config() {
        let config = EndpointConfig::new("replica1", Role::Replica, "postgres://db-r1:5433/app")
            .with_credentials("reader", "pw");
        let target = EndpointTarget::from_config(&config).unwrap();

        assert_eq!(target.name, "replica1");
        assert_eq!(target.address, ServerAddress::new("db-r1", 5433));
        assert_eq!(target.database.as_deref(), Some("app"));
        assert_eq!(target.credentials.username.as_deref(), Some("reader"));
    }

    #[tokio::test]
    async fn test_tcp_connector_connects() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let target = EndpointTarget::new("local", ServerAddress::new("127.0.0.1", port));
        let connector = TcpConnector::new();

        let (stream, accepted) = tokio::join!(connector.connect(&target), listener.accept());
        let stream = stream.unwrap();
        assert!(accepted.is_ok());
        assert!(connector.is_valid(&stream));
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        // 바인드 후 즉시 닫아 사용되지 않는 포트를 얻음
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = EndpointTarget::new("gone", ServerAddress::new("127.0.0.1", port));
        let err = TcpConnector::new().connect(&target).await.unwrap_err();
        assert!(matches!(err, RouterError::Connection(_)));
        assert!(err.to_string().contains("gone"));
    }
}
