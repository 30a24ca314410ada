//! Replication Context
//!
//! 작업 단위별 의도(Intent) 슬롯
//!
//! 슬롯은 tokio 태스크 로컬 저장소에 있으며, [`ReplicationContext::scope`]가
//! 살아있는 동안에만 존재합니다. 스코프가 끝나면 (정상 종료, 에러, 패닉, 취소 모두)
//! 이전 값이 복원되므로 다음 작업 단위로 의도가 새어나가지 않습니다.

use std::cell::Cell;
use std::fmt;
use std::future::Future;

use super::error::{RouterError, RouterResult};

// ============================================================================
// Intent - 접근 의도
// ============================================================================

/// 작업 단위의 선언된 접근 의도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Intent {
    /// 읽기 전용
    Read,
    /// 읽기/쓰기
    Write,
    /// 선언 없음
    #[default]
    Unset,
}

impl Intent {
    /// read-only 플래그에서 의도 결정
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            Self::Read
        } else {
            Self::Write
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Unset => "UNSET",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

tokio::task_local! {
    static CURRENT_INTENT: Cell<Intent>;
}

// ============================================================================
// ReplicationContext - 의도 슬롯
// ============================================================================

/// 현재 작업 단위의 의도 슬롯
///
/// 상태는 없고, 모든 연산은 현재 태스크의 슬롯에 대해 동작합니다.
pub struct ReplicationContext;

impl ReplicationContext {
    /// 현재 의도 조회
    ///
    /// 스코프 밖이거나 `clear()` 이후에는 `Unset`입니다.
    pub fn get() -> Intent {
        CURRENT_INTENT
            .try_with(|slot| slot.get())
            .unwrap_or(Intent::Unset)
    }

    /// 현재 슬롯에 의도 기록
    ///
    /// 활성 작업 단위가 없으면 기록할 슬롯이 없으므로 실패합니다.
    pub fn set(intent: Intent) -> RouterResult<()> {
        CURRENT_INTENT
            .try_with(|slot| slot.set(intent))
            .map_err(|_| RouterError::context("no active unit of work to hold the intent"))
    }

    /// 현재 슬롯을 `Unset`으로 초기화 (멱등)
    pub fn clear() {
        let _ = CURRENT_INTENT.try_with(|slot| slot.set(Intent::Unset));
    }

    /// 현재 태스크에 슬롯이 있는지 여부
    pub fn is_active() -> bool {
        CURRENT_INTENT.try_with(|_| ()).is_ok()
    }

    /// 새 슬롯을 열고 그 안에서 future 실행
    ///
    /// 중첩 스코프는 바깥 슬롯을 가리고, 끝나면 바깥 값이 다시 보입니다.
    pub async fn scope<F>(intent: Intent, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_INTENT.scope(Cell::new(intent), future).await
    }

    /// 동기 클로저용 스코프
    pub fn sync_scope<F, R>(intent: Intent, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT_INTENT.sync_scope(Cell::new(intent), f)
    }

    /// 현재 의도를 이어받는 future 생성
    ///
    /// `tokio::spawn`된 태스크는 태스크 로컬을 상속하지 않습니다. 작업 단위 안에서
    /// 띄운 태스크가 같은 의도로 라우팅되어야 하면 이 함수로 감싸야 합니다.
    pub fn inherit<F>(future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let intent = Self::get();
        CURRENT_INTENT.scope(Cell::new(intent), future)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_from_read_only() {
        assert_eq!(Intent::from_read_only(true), Intent::Read);
        assert_eq!(Intent::from_read_only(false), Intent::Write);
        assert_eq!(Intent::default(), Intent::Unset);
    }

    #[test]
    fn test_intent_display() {
        assert_eq!(Intent::Read.to_string(), "READ");
        assert_eq!(Intent::Write.to_string(), "WRITE");
        assert_eq!(Intent::Unset.to_string(), "UNSET");
    }

    #[test]
    fn test_get_outside_scope() {
        assert_eq!(ReplicationContext::get(), Intent::Unset);
        assert!(!ReplicationContext::is_active());
    }

    #[test]
    fn test_set_outside_scope_fails() {
        let result = ReplicationContext::set(Intent::Write);
        assert!(matches!(result, Err(RouterError::Context(_))));

        // clear는 스코프 밖에서도 안전
        ReplicationContext::clear();
        assert_eq!(ReplicationContext::get(), Intent::Unset);
    }

    #[tokio::test]
    async fn test_scope_set_and_clear() {
        ReplicationContext::scope(Intent::Read, async {
            assert!(ReplicationContext::is_active());
            assert_eq!(ReplicationContext::get(), Intent::Read);

            ReplicationContext::set(Intent::Write).unwrap();
            assert_eq!(ReplicationContext::get(), Intent::Write);

            ReplicationContext::clear();
            ReplicationContext::clear();
            assert_eq!(ReplicationContext::get(), Intent::Unset);
        })
        .await;

        assert_eq!(ReplicationContext::get(), Intent::Unset);
    }

    #[tokio::test]
    async fn test_nested_scope_restores_outer() {
        ReplicationContext::scope(Intent::Write, async {
            ReplicationContext::scope(Intent::Read, async {
                assert_eq!(ReplicationContext::get(), Intent::Read);
            })
            .await;

            assert_eq!(ReplicationContext::get(), Intent::Write);
        })
        .await;
    }

    #[test]
    fn test_sync_scope() {
        let seen = ReplicationContext::sync_scope(Intent::Read, ReplicationContext::get);
        assert_eq!(seen, Intent::Read);
        assert_eq!(ReplicationContext::get(), Intent::Unset);
    }

    #[tokio::test]
    async fn test_spawned_task_does_not_see_intent() {
        ReplicationContext::scope(Intent::Read, async {
            let plain = tokio::spawn(async { ReplicationContext::get() }).await.unwrap();
            assert_eq!(plain, Intent::Unset);

            let inherited = tokio::spawn(ReplicationContext::inherit(async {
                ReplicationContext::get()
            }))
            .await
            .unwrap();
            assert_eq!(inherited, Intent::Read);
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scopes_are_isolated() {
        let mut handles = Vec::new();
        for i in 0..64 {
            let intent = if i % 2 == 0 { Intent::Read } else { Intent::Write };
            handles.push(tokio::spawn(ReplicationContext::scope(intent, async move {
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                    assert_eq!(ReplicationContext::get(), intent);
                }
            })));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
