//! 업스트림 데이터 조회 및 캐싱.
//!
//! 이 crate는 다음을 제공합니다:
//! - 업스트림 가격/거래 API 클라이언트
//! - 신선도 기반 캐시 (리소스별 단일 갱신 보장)
//! - 업스트림 오류 타입

pub mod cache;
pub mod error;
pub mod provider;

pub use error::{DataError, Result};

// 캐시 타입 재내보내기
pub use cache::{
    CacheEntry, CachedResource, Clock, FeedCache, ManualClock, ResourceKind, ResourceStatus,
    ResourceValue, Served, ServedFrom, SystemClock,
};

// 데이터 소스 재내보내기
pub use provider::{MarketDataSource, UpstreamClient};
