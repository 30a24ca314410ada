//! 라우팅 결정
//!
//! 의도와 등록된 레플리카 집합에서 대상 엔드포인트를 고릅니다.

use rand::seq::SliceRandom;
use rand::Rng;

use super::super::context::Intent;
use super::super::manager::ConnectionManager;
use super::registry::{EndpointKind, EndpointRegistry};

/// 라우팅 결정기
///
/// 상태가 없습니다. 읽기 요청마다 레플리카를 독립적으로 균등 추첨하므로, 한 작업 단위 안의
/// 여러 읽기가 서로 다른 레플리카로 갈 수 있습니다 (고정 라우팅 없음).
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingResolver;

impl RoutingResolver {
    /// 새 결정기 생성
    pub fn new() -> Self {
        Self
    }

    /// 현재 스레드의 RNG로 결정
    pub fn decide<M>(&self, intent: Intent, registry: &EndpointRegistry<M>) -> EndpointKind
    where
        M: ConnectionManager,
    {
        self.decide_with(intent, registry, &mut rand::thread_rng())
    }

    /// 주어진 RNG로 결정
    ///
    /// - `Write` → 프라이머리
    /// - `Read` → 등록된 레플리카 중 균등 추첨
    /// - `Unset` → 프라이머리
    pub fn decide_with<M, R>(&self, intent: Intent, registry: &EndpointRegistry<M>, rng: &mut R) -> EndpointKind
    where
        M: ConnectionManager,
        R: Rng + ?Sized,
    {
        match intent {
            Intent::Write => {
                tracing::debug!("routing WRITE to PRIMARY");
                EndpointKind::Primary
            }
            Intent::Read => match registry.replicas().choose(rng) {
                Some(replica) => {
                    let kind = replica.kind();
                    tracing::debug!(%kind, "routing READ to replica");
                    kind
                }
                None => {
                    tracing::warn!("READ requested with no replicas registered, using PRIMARY");
                    EndpointKind::Primary
                }
            },
            Intent::Unset => {
                tracing::warn!("no intent declared for this acquisition, using PRIMARY");
                EndpointKind::Primary
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
