//! 정밀한 금액 표현을 위한 Decimal 유틸리티.
//!
//! 업스트림은 금액을 JSON 숫자(부동소수점) 또는 문자열로 내려주므로,
//! 이진 부동소수점을 거치지 않고 텍스트 표현에서 바로 `Decimal`로 변환합니다.

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// USD 금액 소수점 자릿수.
pub const USD_VALUE_DP: u32 = 2;

/// 단가(USD) 소수점 자릿수.
pub const UNIT_PRICE_DP: u32 = 6;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 지정된 소수점 자릿수로 반올림합니다 (0.5는 0에서 먼 쪽으로).
    fn round_half_up(&self, dp: u32) -> Decimal;

    /// 반올림 후 소수점 자릿수를 고정합니다 (예: 5 → 5.00).
    fn to_fixed(&self, dp: u32) -> Decimal;

    /// 고정 자릿수 문자열로 변환합니다.
    fn to_fixed_string(&self, dp: u32) -> String;
}

impl DecimalExt for Decimal {
    fn round_half_up(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
    }

    fn to_fixed(&self, dp: u32) -> Decimal {
        let mut fixed = self.round_half_up(dp);
        fixed.rescale(dp);
        fixed
    }

    fn to_fixed_string(&self, dp: u32) -> String {
        self.to_fixed(dp).to_string()
    }
}

/// JSON 값에서 Decimal 파싱.
///
/// - 숫자: 직렬화된 텍스트(`12.345`, `1e-7`)를 그대로 해석
/// - 문자열: 쉼표 제거 후 해석 (`"1,234.5"`)
/// - 그 외(`null`, 객체 등): `None`
pub fn decimal_from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal_text(&n.to_string()),
        Value::String(s) => parse_decimal_text(&s.replace(',', "")),
        _ => None,
    }
}

/// 일반 표기와 지수 표기를 모두 허용하는 Decimal 파서.
pub fn parse_decimal_text(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}
