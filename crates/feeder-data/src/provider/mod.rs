//! 데이터 Provider 모듈.
//!
//! ## 업스트림 가격 API
//! - `UpstreamClient`: 토큰 단가 및 최근 거래 내역 조회 (API 키 필요)
//! - 호출당 정확히 한 번의 HTTP 요청, 내부 재시도 없음
//!
//! 캐시 계층은 구체 타입 대신 [`MarketDataSource`] 트레잇에 의존합니다.

pub mod upstream;

pub use upstream::UpstreamClient;

use async_trait::async_trait;
use feeder_core::{PriceSnapshot, TradeRecord};

use crate::error::Result;

/// 가격/거래 데이터 소스 트레잇.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 최신 단가 조회.
    async fn fetch_price(&self) -> Result<PriceSnapshot>;

    /// 최근 거래 내역 조회 (최신순, 최대 `limit`개).
    async fn fetch_trades(&self, limit: usize) -> Result<Vec<TradeRecord>>;
}
