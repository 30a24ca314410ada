//! Transactional Units
//!
//! 작업 단위 설명자와 의도 인터셉터
//!
//! 인터셉터는 작업 단위 본문을 감싸 실행 전 의도를 기록하고, 어떤 경로로 끝나든
//! (정상, 에러, 패닉, 취소) 의도를 되돌립니다. 의도는 `read_only` 플래그에서만 결정되며
//! 본문을 들여다보고 추론하지 않습니다.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use super::context::{Intent, ReplicationContext};
use super::error::RouterError;

// ============================================================================
// TransactionConfig - 작업 단위 설명자
// ============================================================================

/// 트랜잭션 작업 단위 설명자
///
/// 트랜잭션 관리 계층이 붙이는 메타데이터입니다. 기본값은 읽기/쓰기입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionConfig {
    /// 읽기 전용 여부
    pub read_only: bool,
    /// 작업 단위 이름 (로그용)
    pub name: Option<String>,
    /// 본문 전체 타임아웃
    pub timeout: Option<Duration>,
}

impl TransactionConfig {
    /// 새 설정 생성 (읽기/쓰기)
    pub fn new() -> Self {
        Self::default()
    }

    /// 읽기 전용 작업 단위
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// 읽기/쓰기 작업 단위
    pub fn read_write() -> Self {
        Self::default()
    }

    /// 읽기 전용 플래그 설정
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// 이름 설정
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 타임아웃 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 선언된 의도
    pub fn intent(&self) -> Intent {
        Intent::from_read_only(self.read_only)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

// ============================================================================
// NestingPolicy - 중첩 처리 방식
// ============================================================================

/// 중첩된 작업 단위의 의도 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestingPolicy {
    /// 안쪽 단위가 끝나면 바깥 의도 복원 (스택)
    #[default]
    Restore,
    /// 안쪽 단위가 바깥 슬롯을 덮어쓰고 종료 시 `Unset`으로 지움
    ///
    /// 호환 모드입니다. 쓰기 단위 안에서 읽기 단위를 호출하면, 그 뒤 바깥 단위의
    /// 남은 작업은 선언 없음으로 보여 프라이머리로 라우팅됩니다.
    ClearOnExit,
}

/// drop 시 현재 슬롯을 비움
struct ClearOnDrop;

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        ReplicationContext::clear();
    }
}

// ============================================================================
// IntentInterceptor - 의도 인터셉터
// ============================================================================

/// 작업 단위 경계에서 의도를 설정/해제하는 미들웨어
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentInterceptor {
    nesting: NestingPolicy,
}

impl IntentInterceptor {
    /// 새 인터셉터 생성
    pub fn new(nesting: NestingPolicy) -> Self {
        Self { nesting }
    }

    /// 중첩 처리 방식
    pub fn nesting(&self) -> NestingPolicy {
        self.nesting
    }

    /// 비동기 본문 실행
    ///
    /// 본문의 결과와 에러는 그대로 반환됩니다. `timeout`이 지정되면 초과 시
    /// [`RouterError::Timeout`]을 `E`로 변환해 반환합니다.
    pub async fn run<F, Fut, T, E>(&self, unit: &TransactionConfig, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RouterError>,
    {
        let intent = unit.intent();
        tracing::debug!(unit = unit.label(), %intent, "entering unit of work");

        let timeout = unit.timeout;
        let label = unit.label().to_string();
        let work = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, body()).await {
                    Ok(result) => result,
                    Err(_) => Err(E::from(RouterError::timeout(format!(
                        "unit of work '{}' exceeded {:?}",
                        label, limit
                    )))),
                },
                None => body().await,
            }
        };

        match self.nesting {
            NestingPolicy::ClearOnExit if ReplicationContext::is_active() => {
                let _clear = ClearOnDrop;
                let _ = ReplicationContext::set(intent);
                work.await
            }
            _ => ReplicationContext::scope(intent, work).await,
        }
    }

    /// 동기 본문 실행
    ///
    /// `spawn_blocking` 안이나 런타임 밖의 동기 코드용입니다. 타임아웃은 적용되지 않습니다.
    pub fn run_blocking<F, T>(&self, unit: &TransactionConfig, body: F) -> T
    where
        F: FnOnce() -> T,
    {
        let intent = unit.intent();
        tracing::debug!(unit = unit.label(), %intent, "entering blocking unit of work");

        match self.nesting {
            NestingPolicy::ClearOnExit if ReplicationContext::is_active() => {
                let _clear = ClearOnDrop;
                let _ = ReplicationContext::set(intent);
                body()
            }
            _ => ReplicationContext::sync_scope(intent, body),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
