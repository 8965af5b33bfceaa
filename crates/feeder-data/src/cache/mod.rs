//! 캐싱 레이어.
//!
//! - Freshness 캐시: 리소스별 유효 기간과 단일 갱신(single-flight) 보장
//! - Feed 캐시: 가격/거래 목록 리소스를 데이터 소스에 연결

pub mod clock;
pub mod feed;
pub mod freshness;

pub use clock::{Clock, ManualClock, SystemClock};
pub use feed::{FeedCache, ResourceKind, ResourceStatus, ResourceValue};
pub use freshness::{CacheEntry, CachedResource, Served, ServedFrom, SlotStatus};
