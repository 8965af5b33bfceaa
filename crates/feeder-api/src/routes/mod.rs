//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (캐시된 최신 가격 포함)
//! - `/health/cache` - 리소스별 캐시 상태
//! - `/trades` - 최근 거래 목록

pub mod health;
pub mod trades;

pub use health::{health_router, CacheHealthResponse, HealthResponse};
pub use trades::{flow_label, trades_router, TradeResponse};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 응답 출처 헤더 (`fresh` | `stale` | `empty`).
pub const CACHE_STATUS_HEADER: &str = "x-cache-status";

/// API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // 피드 엔드포인트
        .merge(trades_router())
}
