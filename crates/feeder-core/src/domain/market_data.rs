//! 시세 데이터 구조체.

use crate::types::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 추적 중인 자산의 최신 단가.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// 단가 (USD)
    pub price: Price,
}

impl PriceSnapshot {
    /// 새 가격 스냅샷을 생성합니다.
    pub fn new(price: Price) -> Self {
        Self { price }
    }

    /// 가격이 0인지 (데이터 없음 기본값) 확인합니다.
    pub fn is_zero(&self) -> bool {
        self.price == Decimal::ZERO
    }
}
