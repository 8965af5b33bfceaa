//! 신선도 기반 단일 리소스 캐시.
//!
//! 리소스 하나(가격 또는 거래 목록)에 대해 마지막 성공 값과 그 시각을 보관하고,
//! 읽기 요청 시 유효 기간을 넘었으면 업스트림에서 갱신합니다.
//!
//! # 동작 흐름
//!
//! ```text
//! read_with(fetch)
//!         │
//!         ▼
//! ┌──────────────────────┐
//! │ 1. 상태 스냅샷 (읽기)  │ ← age < window 이면 Fresh 반환
//! └──────────┬───────────┘
//!            │ stale
//! ┌──────────▼───────────┐
//! │ 2. 갱신 Lock 획득     │ ← 리소스당 하나의 갱신만 진행
//! └──────────┬───────────┘
//!            │
//!     ┌──────┴──────┐
//!     │ 대기 중 다른 │
//!     │ 갱신 완료?   │
//!     └──────┬──────┘
//!       YES  │  NO
//!        │   ▼
//!        │ ┌──────────────────────┐
//!        │ │ 3. 갱신 태스크 spawn  │ ← 호출자가 취소되어도 끝까지 실행
//!        │ └──────────┬───────────┘
//!        ▼            ▼
//!     ┌──────────────────────┐
//!     │ 4. 마지막 시도 결과로  │ ← Fresh / Stale / Empty
//!     │    응답 결정          │
//!     └──────────────────────┘
//! ```
//!
//! 갱신 실패 시 `fetched_at_ms`는 그대로 유지되므로 다음 읽기에서 즉시 재시도합니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use crate::error::{DataError, Result};

/// 캐시 항목. 값과 그 값을 가져온 시각은 항상 함께 교체됩니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry<T> {
    /// 마지막 성공 조회 시각 (에포크 밀리초, 한 번도 성공하지 않았으면 0)
    pub fetched_at_ms: i64,
    pub value: T,
}

/// 응답 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    /// 유효 기간 내 캐시 또는 방금 갱신한 값
    Fresh,
    /// 갱신 실패로 이전 값을 반환
    Stale,
    /// 한 번도 조회에 성공하지 못해 기본값을 반환
    Empty,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Fresh => "fresh",
            ServedFrom::Stale => "stale",
            ServedFrom::Empty => "empty",
        }
    }
}

impl std::fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 캐시 읽기 결과.
///
/// 업스트림 오류는 `error`에 진단용으로만 담기며, 읽기 자체는 실패하지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub served_from: ServedFrom,
    /// 값을 가져온 시각 (Empty면 `None`)
    pub fetched_at_ms: Option<i64>,
    /// 이번 읽기에서 관찰된 갱신 실패
    pub error: Option<DataError>,
}

impl<T> Served<T> {
    /// 값만 변환합니다.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Served<U> {
        Served {
            value: f(self.value),
            served_from: self.served_from,
            fetched_at_ms: self.fetched_at_ms,
            error: self.error,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.served_from == ServedFrom::Fresh
    }
}

/// 캐시 상태 진단 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub fetched_at_ms: Option<i64>,
    pub age_ms: Option<i64>,
    pub has_value: bool,
    pub refresh_attempts: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SlotState<T> {
    entry: CacheEntry<T>,
    populated: bool,
    /// 완료된 갱신 시도 횟수 (성공/실패 포함)
    attempts: u64,
    /// 마지막 시도가 실패했으면 그 오류
    last_error: Option<DataError>,
}

impl<T: Clone + Default> SlotState<T> {
    /// 마지막 갱신 시도 결과를 기준으로 응답을 구성합니다.
    fn settle(&self) -> Served<T> {
        match (&self.last_error, self.populated) {
            (None, true) => self.serve(ServedFrom::Fresh, None),
            (Some(err), true) => self.serve(ServedFrom::Stale, Some(err.clone())),
            (err, false) => Served {
                value: T::default(),
                served_from: ServedFrom::Empty,
                fetched_at_ms: None,
                error: err.clone(),
            },
        }
    }

    fn serve(&self, served_from: ServedFrom, error: Option<DataError>) -> Served<T> {
        Served {
            value: self.entry.value.clone(),
            served_from,
            fetched_at_ms: Some(self.entry.fetched_at_ms),
            error,
        }
    }

    fn is_fresh(&self, now_ms: i64, window: Duration) -> bool {
        self.populated && now_ms.saturating_sub(self.entry.fetched_at_ms) < window.as_millis() as i64
    }
}

/// 신선도 기반 캐시 리소스.
///
/// 같은 리소스에 대해 동시에 진행되는 업스트림 갱신은 최대 하나입니다.
/// 갱신 중에 도착한 읽기는 새 요청을 만들지 않고 진행 중인 갱신의 결과를 공유합니다.
pub struct CachedResource<T> {
    name: &'static str,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<SlotState<T>>>,
    refresh_lock: Arc<Mutex<()>>,
}

impl<T> CachedResource<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// 빈 상태로 시작하는 캐시 리소스 생성.
    pub fn new(name: &'static str, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            window,
            clock,
            state: Arc::new(RwLock::new(SlotState::default())),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 캐시를 읽고 필요하면 `fetch`로 갱신합니다.
    ///
    /// `fetch`는 갱신이 실제로 필요할 때만 한 번 호출됩니다.
    pub async fn read_with<F, Fut>(&self, fetch: F) -> Served<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // 1. 신선도 확인과 시도 횟수 스냅샷을 같은 Lock 안에서
        let seen_attempts = {
            let state = self.state.read().await;
            let now_ms = self.clock.now_millis();
            if state.is_fresh(now_ms, self.window) {
                return self.record(state.serve(ServedFrom::Fresh, None));
            }
            debug!(
                resource = self.name,
                age_ms = state.populated.then(|| now_ms - state.entry.fetched_at_ms),
                "캐시 만료, 갱신 대기"
            );
            state.attempts
        };

        // 2. 갱신 Lock 획득
        let guard = self.refresh_lock.clone().lock_owned().await;

        // 대기하는 동안 다른 갱신이 끝났으면 그 결과를 사용
        {
            let state = self.state.read().await;
            if state.attempts != seen_attempts {
                debug!(resource = self.name, "진행 중이던 갱신 결과 공유");
                return self.record(state.settle());
            }
        }

        // 3. 갱신 태스크 실행 (Lock guard는 태스크가 소유)
        let future = fetch();
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let name = self.name;

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = future.await;

            let mut state = state.write().await;
            match result {
                Ok(value) => {
                    state.entry = CacheEntry {
                        fetched_at_ms: clock.now_millis(),
                        value,
                    };
                    state.populated = true;
                    state.last_error = None;
                    counter!("feeder_upstream_requests_total", "resource" => name, "outcome" => "ok")
                        .increment(1);
                    info!(resource = name, "캐시 갱신 완료");
                }
                Err(e) => {
                    counter!("feeder_upstream_requests_total", "resource" => name, "outcome" => e.kind())
                        .increment(1);
                    warn!(
                        resource = name,
                        error = %e,
                        has_value = state.populated,
                        "업스트림 조회 실패, 이전 캐시 데이터 사용"
                    );
                    state.last_error = Some(e);
                }
            }
            state.attempts += 1;
        });

        // 4. 결과 반영
        if let Err(e) = handle.await {
            error!(resource = self.name, error = %e, "캐시 갱신 태스크 비정상 종료");
            let state = self.state.read().await;
            let mut served = state.settle();
            if served.served_from == ServedFrom::Fresh {
                served.served_from = ServedFrom::Stale;
            }
            served.error = Some(DataError::UpstreamUnavailable(format!("갱신 태스크 실패: {}", e)));
            return self.record(served);
        }

        let state = self.state.read().await;
        self.record(state.settle())
    }

    /// 현재 캐시 항목 (값이 없으면 `None`).
    pub async fn entry(&self) -> Option<CacheEntry<T>> {
        let state = self.state.read().await;
        state.populated.then(|| state.entry.clone())
    }

    /// 진단용 상태.
    pub async fn status(&self) -> SlotStatus {
        let state = self.state.read().await;
        let fetched_at_ms = state.populated.then_some(state.entry.fetched_at_ms);

        SlotStatus {
            fetched_at_ms,
            age_ms: fetched_at_ms.map(|at| self.clock.now_millis().saturating_sub(at)),
            has_value: state.populated,
            refresh_attempts: state.attempts,
            last_error: state.last_error.as_ref().map(ToString::to_string),
        }
    }

    fn record(&self, served: Served<T>) -> Served<T> {
        counter!(
            "feeder_cache_reads_total",
            "resource" => self.name,
            "served_from" => served.served_from.as_str()
        )
        .increment(1);
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WINDOW: Duration = Duration::from_secs(5);

    fn resource(clock: &Arc<ManualClock>) -> CachedResource<u32> {
        CachedResource::new("test", WINDOW, clock.clone() as Arc<dyn Clock>)
    }

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        result: Result<u32>,
    ) -> impl FnOnce() -> std::future::Ready<Result<u32>> + Send {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(result)
        }
    }

    #[tokio::test]
    async fn test_first_read_fetches_and_serves_fresh() {
        let clock = Arc::new(ManualClock::new(10_000));
        let cache = resource(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let served = cache.read_with(counting_fetch(&calls, Ok(7))).await;

        assert_eq!(served.value, 7);
        assert_eq!(served.served_from, ServedFrom::Fresh);
        assert_eq!(served.fetched_at_ms, Some(10_000));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reads_within_window_skip_upstream() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = resource(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.read_with(counting_fetch(&calls, Ok(1))).await;
        clock.advance(Duration::from_millis(4_999));
        let served = cache.read_with(counting_fetch(&calls, Ok(2))).await;

        assert_eq!(served.value, 1);
        assert!(served.is_fresh());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_at_window_boundary_refreshes() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = resource(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.read_with(counting_fetch(&calls, Ok(1))).await;
        clock.advance(WINDOW);
        let served = cache.read_with(counting_fetch(&calls, Ok(2))).await;

        assert_eq!(served.value, 2);
        assert_eq!(served.fetched_at_ms, Some(5_000));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_serves_stale_and_keeps_timestamp() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = resource(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.read_with(counting_fetch(&calls, Ok(100))).await;
        clock.advance(Duration::from_secs(10));

        let err = DataError::UpstreamUnavailable("down".to_string());
        let served = cache.read_with(counting_fetch(&calls, Err(err.clone()))).await;

        assert_eq!(served.value, 100);
        assert_eq!(served.served_from, ServedFrom::Stale);
        assert_eq!(served.error, Some(err.clone()));
        assert_eq!(cache.entry().await.map(|e| e.fetched_at_ms), Some(0));

        // 실패 직후 읽기는 유효 기간을 기다리지 않고 재시도
        let served = cache.read_with(counting_fetch(&calls, Err(err))).await;
        assert_eq!(served.served_from, ServedFrom::Stale);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_without_value_serves_empty() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = resource(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = DataError::MalformedResponse("no value".to_string());
        let served = cache.read_with(counting_fetch(&calls, Err(err))).await;

        assert_eq!(served.value, 0);
        assert_eq!(served.served_from, ServedFrom::Empty);
        assert_eq!(served.fetched_at_ms, None);
        assert!(served.error.is_some());
        assert!(cache.entry().await.is_none());
    }

    #[tokio::test]
    async fn test_recovers_after_failure() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = resource(&clock);
        let calls = Arc::new(AtomicUsize::new(0));

        let err = DataError::UpstreamUnavailable("down".to_string());
        cache.read_with(counting_fetch(&calls, Err(err))).await;
        clock.advance(Duration::from_millis(10));
        let served = cache.read_with(counting_fetch(&calls, Ok(9))).await;

        assert_eq!(served.value, 9);
        assert_eq!(served.served_from, ServedFrom::Fresh);
        assert!(served.error.is_none());

        let status = cache.status().await;
        assert_eq!(status.refresh_attempts, 2);
        assert_eq!(status.last_error, None);
        assert_eq!(status.age_ms, Some(0));
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_single_fetch() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(resource(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let reads = (0..10).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .read_with(move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(42)
                        }
                    })
                    .await
            }
        });
        let results = futures::future::join_all(reads).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|served| served.value == 42 && served.served_from == ServedFrom::Fresh));
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_failed_refresh() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(resource(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.read_with(counting_fetch(&calls, Ok(1))).await;
        clock.advance(Duration::from_secs(10));

        let reads = (0..5).map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            async move {
                cache
                    .read_with(move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Err(DataError::UpstreamUnavailable("timeout".to_string()))
                        }
                    })
                    .await
            }
        });
        let results = futures::future::join_all(reads).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(results
            .iter()
            .all(|served| served.value == 1 && served.served_from == ServedFrom::Stale));
    }

    #[tokio::test]
    async fn test_cancelled_reader_does_not_cancel_refresh() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(resource(&clock));
        let calls = Arc::new(AtomicUsize::new(0));

        let reader = {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .read_with(move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(5)
                        }
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        reader.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entry().await.map(|e| e.value), Some(5));

        // 갱신 결과가 캐시에 남아 있으므로 추가 호출 없음
        let served = cache.read_with(counting_fetch(&calls, Ok(6))).await;
        assert_eq!(served.value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_served_map_keeps_metadata() {
        let served = Served {
            value: 2u32,
            served_from: ServedFrom::Stale,
            fetched_at_ms: Some(1),
            error: None,
        };
        let mapped = served.map(|v| v * 10);

        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.served_from, ServedFrom::Stale);
        assert_eq!(ServedFrom::Empty.to_string(), "empty");
    }
}
