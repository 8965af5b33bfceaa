//! 가격/거래 피드 캐시.
//!
//! 리소스 종류별로 독립된 [`CachedResource`]를 두고 같은 데이터 소스를 공유합니다.
//! 프로세스 시작 시 두 리소스 모두 Empty 상태입니다.

use std::sync::Arc;
use std::time::Duration;

use feeder_core::{resource_span, CacheConfig, PriceSnapshot, TradeRecord};
use serde::Serialize;
use tracing::Instrument;

use super::clock::{Clock, SystemClock};
use super::freshness::{CachedResource, Served, SlotStatus};
use crate::provider::MarketDataSource;

/// 캐시 리소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Price,
    Trades,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Price => "price",
            ResourceKind::Trades => "trades",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 종류 구분 없이 읽은 캐시 값.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    Price(PriceSnapshot),
    Trades(Vec<TradeRecord>),
}

/// 리소스별 캐시 상태 (`/health/cache` 응답용).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    pub resource: ResourceKind,
    pub window_ms: u64,
    #[serde(flatten)]
    pub slot: SlotStatus,
}

/// 가격/거래 피드 캐시.
pub struct FeedCache {
    source: Arc<dyn MarketDataSource>,
    trade_limit: usize,
    price: CachedResource<PriceSnapshot>,
    trades: CachedResource<Vec<TradeRecord>>,
}

impl FeedCache {
    /// 시스템 시계를 사용하는 캐시 생성.
    pub fn new(source: Arc<dyn MarketDataSource>, config: &CacheConfig, trade_limit: usize) -> Self {
        Self::with_clock(source, config, trade_limit, Arc::new(SystemClock))
    }

    /// 지정한 시계를 사용하는 캐시 생성.
    pub fn with_clock(
        source: Arc<dyn MarketDataSource>,
        config: &CacheConfig,
        trade_limit: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            trade_limit,
            price: CachedResource::new(
                ResourceKind::Price.as_str(),
                config.price_window(),
                clock.clone(),
            ),
            trades: CachedResource::new(
                ResourceKind::Trades.as_str(),
                config.trades_window(),
                clock,
            ),
        }
    }

    pub fn trade_limit(&self) -> usize {
        self.trade_limit
    }

    /// 가격 조회 (캐시 우선).
    pub async fn read_price(&self) -> Served<PriceSnapshot> {
        let source = Arc::clone(&self.source);
        self.price
            .read_with(move || async move { source.fetch_price().await })
            .instrument(resource_span!("cache_read", ResourceKind::Price))
            .await
    }

    /// 최근 거래 목록 조회 (캐시 우선, 최신순).
    pub async fn read_trades(&self) -> Served<Vec<TradeRecord>> {
        let source = Arc::clone(&self.source);
        let limit = self.trade_limit;
        self.trades
            .read_with(move || async move { source.fetch_trades(limit).await })
            .instrument(resource_span!("cache_read", ResourceKind::Trades))
            .await
    }

    /// 종류별 조회.
    pub async fn read(&self, kind: ResourceKind) -> Served<ResourceValue> {
        match kind {
            ResourceKind::Price => self.read_price().await.map(ResourceValue::Price),
            ResourceKind::Trades => self.read_trades().await.map(ResourceValue::Trades),
        }
    }

    /// 전체 리소스 상태.
    pub async fn status(&self) -> Vec<ResourceStatus> {
        vec![
            ResourceStatus {
                resource: ResourceKind::Price,
                window_ms: duration_ms(self.price.window()),
                slot: self.price.status().await,
            },
            ResourceStatus {
                resource: ResourceKind::Trades,
                window_ms: duration_ms(self.trades.window()),
                slot: self.trades.status().await,
            },
        ]
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl std::fmt::Debug for FeedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCache")
            .field("trade_limit", &self.trade_limit)
            .field("price_window", &self.price.window())
            .field("trades_window", &self.trades.window())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::freshness::ServedFrom;
    use crate::error::{DataError, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use feeder_core::TradeKind;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 호출 횟수를 세는 가짜 데이터 소스.
    #[derive(Default)]
    struct FakeSource {
        price_calls: AtomicUsize,
        trade_calls: AtomicUsize,
        price: Mutex<Option<Result<PriceSnapshot>>>,
        trades: Mutex<Option<Result<Vec<TradeRecord>>>>,
    }

    impl FakeSource {
        fn set_price(&self, result: Result<PriceSnapshot>) {
            *self.price.lock().unwrap() = Some(result);
        }

        fn set_trades(&self, result: Result<Vec<TradeRecord>>) {
            *self.trades.lock().unwrap() = Some(result);
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn fetch_price(&self) -> Result<PriceSnapshot> {
            self.price_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.price
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err(DataError::UpstreamUnavailable("unset".to_string())))
        }

        async fn fetch_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
            self.trade_calls.fetch_add(1, Ordering::SeqCst);
            self.trades
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(Vec::new()))
                .map(|mut trades| {
                    trades.truncate(limit);
                    trades
                })
        }
    }

    fn setup() -> (Arc<FakeSource>, Arc<ManualClock>, FeedCache) {
        let source = Arc::new(FakeSource::default());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = FeedCache::with_clock(
            source.clone(),
            &CacheConfig::default(),
            10,
            clock.clone(),
        );
        (source, clock, cache)
    }

    fn trade(secs: i64) -> TradeRecord {
        TradeRecord::new(
            Utc.timestamp_opt(secs, 0).unwrap(),
            TradeKind::Inflow,
            dec!(10),
            dec!(0.5),
        )
    }

    #[tokio::test]
    async fn test_concurrent_price_reads_single_upstream_call() {
        let (source, _clock, cache) = setup();
        source.set_price(Ok(PriceSnapshot::new(dec!(1.25))));

        let reads = (0..10).map(|_| cache.read_price());
        let results = futures::future::join_all(reads).await;

        assert_eq!(source.price_calls.load(Ordering::SeqCst), 1);
        for served in results {
            assert_eq!(served.value.price, dec!(1.25));
            assert_eq!(served.served_from, ServedFrom::Fresh);
        }
    }

    #[tokio::test]
    async fn test_stale_price_after_upstream_failure() {
        let (source, clock, cache) = setup();
        source.set_price(Ok(PriceSnapshot::new(dec!(1.00))));
        cache.read_price().await;

        clock.advance(Duration::from_secs(10));
        source.set_price(Err(DataError::UpstreamUnavailable("503".to_string())));
        let served = cache.read_price().await;

        assert_eq!(served.value.price, dec!(1.00));
        assert_eq!(served.served_from, ServedFrom::Stale);
        assert!(served.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_price_when_never_fetched() {
        let (source, _clock, cache) = setup();
        source.set_price(Err(DataError::MalformedResponse("no value".to_string())));

        let served = cache.read_price().await;

        assert!(served.value.is_zero());
        assert_eq!(served.served_from, ServedFrom::Empty);
    }

    #[tokio::test]
    async fn test_resources_are_independent() {
        let (source, _clock, cache) = setup();
        source.set_price(Ok(PriceSnapshot::new(dec!(2))));
        source.set_trades(Ok(vec![trade(2), trade(1)]));

        cache.read_price().await;
        let trades = cache.read_trades().await;
        cache.read_trades().await;

        assert_eq!(trades.value.len(), 2);
        assert_eq!(source.price_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.trade_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_per_resource_windows() {
        let source = Arc::new(FakeSource::default());
        let clock = Arc::new(ManualClock::new(0));
        let config = CacheConfig {
            price_staleness_ms: 1_000,
            trades_staleness_ms: 60_000,
        };
        let cache = FeedCache::with_clock(source.clone(), &config, 10, clock.clone());
        source.set_price(Ok(PriceSnapshot::new(dec!(3))));

        cache.read_price().await;
        cache.read_trades().await;
        clock.advance(Duration::from_secs(2));
        cache.read_price().await;
        cache.read_trades().await;

        assert_eq!(source.price_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.trade_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_by_kind_and_status() {
        let (source, _clock, cache) = setup();
        source.set_price(Ok(PriceSnapshot::new(dec!(4))));

        let served = cache.read(ResourceKind::Price).await;
        assert_eq!(served.value, ResourceValue::Price(PriceSnapshot::new(dec!(4))));

        let status = cache.status().await;
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].resource, ResourceKind::Price);
        assert!(status[0].slot.has_value);
        assert_eq!(status[0].window_ms, 5_000);
        assert!(!status[1].slot.has_value);
        assert_eq!(status[1].slot.refresh_attempts, 0);
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = ResourceStatus {
            resource: ResourceKind::Trades,
            window_ms: 5_000,
            slot: SlotStatus {
                fetched_at_ms: None,
                age_ms: None,
                has_value: false,
                refresh_attempts: 1,
                last_error: Some("Upstream unavailable: timeout".to_string()),
            },
        };
        let json = serde_json::to_value(&status).unwrap();

        assert_eq!(json["resource"], "trades");
        assert_eq!(json["refresh_attempts"], 1);
        assert!(json["fetched_at_ms"].is_null());
    }
}
