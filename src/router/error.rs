//! Router Error Types
//!
//! 라우터 에러 정의

use std::io;
use thiserror::Error;

// ============================================================================
// RouterError - 라우터 에러
// ============================================================================

/// 라우터 에러
///
/// 풀에서 올라온 에러(`PoolExhausted`, `ConnectionTimeout`, `Connection`, `Pool`)는
/// 라우터가 재시도하거나 다른 엔드포인트로 돌리지 않고 그대로 호출자에게 전달됩니다.
#[derive(Error, Debug)]
pub enum RouterError {
    /// 설정 에러 (알 수 없는 엔드포인트, 잘못된 토폴로지)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 풀 고갈 (획득 타임아웃 내에 슬롯을 얻지 못함)
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    /// 연결 타임아웃
    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// 풀 에러
    #[error("Pool error: {0}")]
    Pool(String),

    /// 컨텍스트 에러 (활성 작업 단위 없음)
    #[error("Context error: {0}")]
    Context(String),

    /// 작업 단위 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),

    /// YAML 파싱 에러
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RouterError {
    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 풀 고갈 에러 생성
    pub fn pool_exhausted(msg: impl Into<String>) -> Self {
        Self::PoolExhausted(msg.into())
    }

    /// 연결 타임아웃 에러 생성
    pub fn connection_timeout(msg: impl Into<String>) -> Self {
        Self::ConnectionTimeout(msg.into())
    }

    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 풀 에러 생성
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// 컨텍스트 에러 생성
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 설정 에러 여부 (시작 시 치명적)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Yaml(_))
    }

    /// 풀 협력자에서 발생한 에러 여부
    pub fn is_pool_failure(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted(_) | Self::ConnectionTimeout(_) | Self::Connection(_) | Self::Pool(_)
        )
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 라우터 결과 타입
pub type RouterResult<T> = Result<T, RouterError>;

// ============================================================================
// Tests
// ============================================================================
