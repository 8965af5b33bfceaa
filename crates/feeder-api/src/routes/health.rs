//! 헬스 체크 endpoint.
//!
//! 서버 생존 여부와 함께 캐시된 최신 가격을 반환합니다.
//! 업스트림 장애는 HTTP 오류가 아니라 `status`/`note` 필드로만 드러납니다.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use feeder_data::{ResourceStatus, ServedFrom};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::CACHE_STATUS_HEADER;
use crate::state::AppState;

/// 헬스 체크 응답 구조체.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 서비스 상태 ("alive" | "error")
    pub status: String,

    /// 최신 단가 (데이터가 없으면 0)
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// 응답 시각 (에포크 밀리초)
    pub timestamp: i64,

    /// 진단 메시지 (업스트림 장애 시)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// 캐시 상태 응답 구조체.
#[derive(Debug, Serialize)]
pub struct CacheHealthResponse {
    /// API 버전
    pub version: String,

    /// 서버 업타임(초)
    pub uptime_secs: i64,

    /// 추적 중인 토큰 주소
    pub token_address: String,

    /// 리소스별 캐시 상태
    pub resources: Vec<ResourceStatus>,
}

/// 헬스 체크.
///
/// 가격 캐시를 읽어 서비스 상태를 판단합니다. 항상 200을 반환합니다.
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let served = state.cache.read_price().await;

    let (status, note) = match served.served_from {
        ServedFrom::Fresh => ("alive", None),
        ServedFrom::Stale => (
            "alive",
            Some(format!(
                "Serving last known price, upstream refresh failed: {}",
                describe(served.error.as_ref())
            )),
        ),
        ServedFrom::Empty => (
            "error",
            Some(format!(
                "Price unavailable: {}",
                describe(served.error.as_ref())
            )),
        ),
    };

    let response = HealthResponse {
        status: status.to_string(),
        price: served.value.price,
        timestamp: chrono::Utc::now().timestamp_millis(),
        note,
    };

    (
        [(CACHE_STATUS_HEADER, served.served_from.as_str())],
        Json(response),
    )
}

/// 캐시 상태 조회 (운영자용).
///
/// 업스트림을 호출하지 않습니다.
/// GET /health/cache
pub async fn cache_status(State(state): State<Arc<AppState>>) -> Json<CacheHealthResponse> {
    Json(CacheHealthResponse {
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        token_address: state.token_address.clone(),
        resources: state.cache.status().await,
    })
}

fn describe(error: Option<&feeder_data::DataError>) -> String {
    error
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown error".to_string())
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/cache", get(cache_status))
}
