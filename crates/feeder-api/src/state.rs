//! 애플리케이션 상태 관리.
//!
//! 모든 핸들러에서 공유하는 상태를 정의합니다.
//! 캐시는 전역 변수가 아니라 이 상태가 소유하며, 프로세스 시작 시 Empty로 초기화됩니다.

use std::sync::Arc;

use feeder_data::FeedCache;

/// 애플리케이션 공유 상태.
///
/// `Arc<AppState>` 형태로 라우터에 전달됩니다.
#[derive(Debug)]
pub struct AppState {
    /// 가격/거래 피드 캐시
    pub cache: Arc<FeedCache>,

    /// 추적 중인 토큰 주소
    pub token_address: String,

    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    pub fn new(cache: Arc<FeedCache>, token_address: impl Into<String>) -> Self {
        Self {
            cache,
            token_address: token_address.into(),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }
}


/// 테스트용 AppState 생성 헬퍼.
///
/// 주어진 소스와 기본 캐시 설정으로 상태를 생성합니다.
#[cfg(test)]
pub fn create_test_state(source: Arc<dyn feeder_data::MarketDataSource>) -> AppState {
    use feeder_core::CacheConfig;

    let cache = FeedCache::new(source, &CacheConfig::default(), 10);
    AppState::new(Arc::new(cache), "TEST_TOKEN")
}
