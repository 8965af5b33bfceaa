//! 거래 기록.
//!
//! 이 모듈은 업스트림 거래 내역을 서비스 내부 표현으로 정의합니다:
//! - `TradeKind` - 자금 유입/유출 구분
//! - `TradeRecord` - 개별 거래 기록

use crate::types::{DecimalExt, UNIT_PRICE_DP, USD_VALUE_DP};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 거래 방향 (토큰 기준 자금 흐름).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    /// 매수 (자금 유입)
    Inflow,
    /// 매도 및 기타 (자금 유출)
    Outflow,
}

impl TradeKind {
    /// 업스트림 거래 유형 문자열에서 변환.
    ///
    /// 정확히 "buy"인 경우만 유입으로 보고, 나머지는 모두 유출로 분류합니다.
    pub fn from_upstream(tx_type: &str) -> Self {
        if tx_type == "buy" {
            TradeKind::Inflow
        } else {
            TradeKind::Outflow
        }
    }
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeKind::Inflow => write!(f, "inflow"),
            TradeKind::Outflow => write!(f, "outflow"),
        }
    }
}

/// 개별 거래 기록.
///
/// 금액 필드는 생성 시점에 고정 자릿수로 맞춰집니다
/// (USD 금액 2자리, 단가 6자리).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 체결 시각
    pub occurred_at: DateTime<Utc>,
    /// 거래 방향
    pub kind: TradeKind,
    /// 거래 금액 (USD, 소수점 2자리)
    pub value_usd: Decimal,
    /// 체결 단가 (USD, 소수점 6자리)
    pub price_usd: Decimal,
}

impl TradeRecord {
    /// 새 거래 기록을 생성합니다.
    pub fn new(
        occurred_at: DateTime<Utc>,
        kind: TradeKind,
        value_usd: Decimal,
        price_usd: Decimal,
    ) -> Self {
        Self {
            occurred_at,
            kind,
            value_usd: value_usd.to_fixed(USD_VALUE_DP),
            price_usd: price_usd.to_fixed(UNIT_PRICE_DP),
        }
    }

    /// 유입 거래인지 확인합니다.
    pub fn is_inflow(&self) -> bool {
        self.kind == TradeKind::Inflow
    }
}

/// 거래 목록을 최신순으로 정렬하고 최대 `limit`개로 자릅니다.
pub fn latest_first(mut trades: Vec<TradeRecord>, limit: usize) -> Vec<TradeRecord> {
    trades.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    trades.truncate(limit);
    trades
}
