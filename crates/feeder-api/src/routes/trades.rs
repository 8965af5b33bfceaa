//! 최근 거래 endpoint.
//!
//! 캐시된 최근 거래 목록을 최신순으로 반환합니다.
//! 업스트림 장애로 데이터가 없으면 빈 배열을 반환하고,
//! 구분이 필요한 호출자는 `x-cache-status` 헤더를 확인합니다.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::SecondsFormat;
use feeder_core::{TradeKind, TradeRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::CACHE_STATUS_HEADER;
use crate::state::AppState;

/// 거래 응답 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponse {
    /// 체결 시각 (ISO 8601, UTC)
    pub time: String,

    /// "Feed" (유입) | "Starve" (유출)
    #[serde(rename = "type")]
    pub flow: String,

    /// 거래 금액 (USD, 소수점 2자리 문자열)
    pub value_usd: String,

    /// 체결 단가 (USD, 소수점 6자리 문자열)
    pub price_usd: String,
}

/// 거래 방향을 응답 라벨로 변환.
pub fn flow_label(kind: TradeKind) -> &'static str {
    match kind {
        TradeKind::Inflow => "Feed",
        TradeKind::Outflow => "Starve",
    }
}

impl From<&TradeRecord> for TradeResponse {
    fn from(trade: &TradeRecord) -> Self {
        Self {
            time: trade
                .occurred_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            flow: flow_label(trade.kind).to_string(),
            value_usd: trade.value_usd.to_string(),
            price_usd: trade.price_usd.to_string(),
        }
    }
}

/// 최근 거래 목록 조회.
///
/// GET /trades
pub async fn list_trades(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let served = state.cache.read_trades().await;
    let trades: Vec<TradeResponse> = served.value.iter().map(TradeResponse::from).collect();

    (
        [(CACHE_STATUS_HEADER, served.served_from.as_str())],
        Json(trades),
    )
}

/// 거래 라우터 생성.
pub fn trades_router() -> Router<Arc<AppState>> {
    Router::new().route("/trades", get(list_trades))
}
