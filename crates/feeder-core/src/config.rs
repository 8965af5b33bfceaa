//! 설정 관리.
//!
//! 두 가지 로드 경로를 제공합니다:
//! - [`AppConfig::load`]: TOML 파일 + `FEEDER__SECTION__KEY` 환경 변수 (`config` crate)
//! - [`AppConfig::from_env`]: 단순 환경 변수 (`PORT`, `TOKEN_ADDRESS`, ...)
//!
//! 모든 항목에는 하드코딩된 기본값이 있습니다. 기본 API 키는 공개 저장소에
//! 노출된 값이므로 운영 환경에서는 반드시 `UPSTREAM_API_KEY`로 덮어써야 합니다.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::FeederResult;

/// 기본 업스트림 API 키 (공개 데모 키).
pub const DEFAULT_API_KEY: &str = "public-demo-key";

/// 기본 추적 토큰 주소.
pub const DEFAULT_TOKEN_ADDRESS: &str = "So11111111111111111111111111111111111111112";

/// HTTP 요청 전체 타임아웃 (초).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 업스트림 요청 타임아웃 상한 (초). 갱신을 기다리는 요청이 HTTP 타임아웃보다 먼저 끝나야 합니다.
pub const MAX_UPSTREAM_TIMEOUT_SECS: u64 = REQUEST_TIMEOUT_SECS - 5;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 업스트림 API 설정
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// 업스트림 가격/거래 API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// 추적 대상 토큰 주소
    pub token_address: String,
    /// API 키
    pub api_key: String,
    /// 체인 이름 (`x-chain` 헤더)
    pub chain: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 거래 목록 최대 개수
    pub trade_limit: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://public-api.birdeye.so".to_string(),
            token_address: DEFAULT_TOKEN_ADDRESS.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            chain: "solana".to_string(),
            timeout_secs: 10,
            trade_limit: 10,
        }
    }
}

impl UpstreamConfig {
    /// 요청 타임아웃을 Duration으로 반환 (1초 ~ `MAX_UPSTREAM_TIMEOUT_SECS`)
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(1, MAX_UPSTREAM_TIMEOUT_SECS))
    }

    /// 설정된 타임아웃이 허용 범위를 벗어나 조정되었는지 확인
    pub fn timeout_adjusted(&self) -> bool {
        self.timeout().as_secs() != self.timeout_secs
    }

    /// 기본(공개) API 키를 사용 중인지 확인
    pub fn uses_default_api_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

/// 캐시 신선도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// 가격 캐시 유효 기간 (밀리초)
    pub price_staleness_ms: u64,
    /// 거래 목록 캐시 유효 기간 (밀리초)
    pub trades_staleness_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            price_staleness_ms: 5_000,
            trades_staleness_ms: 5_000,
        }
    }
}

impl CacheConfig {
    /// 가격 캐시 유효 기간
    pub fn price_window(&self) -> Duration {
        Duration::from_millis(self.price_staleness_ms)
    }

    /// 거래 목록 캐시 유효 기간
    pub fn trades_window(&self) -> Duration {
        Duration::from_millis(self.trades_staleness_ms)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> FeederResult<Self> {
        let defaults = AppConfig::default();

        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("upstream.base_url", defaults.upstream.base_url)?
            .set_default("upstream.token_address", defaults.upstream.token_address)?
            .set_default("upstream.api_key", defaults.upstream.api_key)?
            .set_default("upstream.chain", defaults.upstream.chain)?
            .set_default("upstream.timeout_secs", defaults.upstream.timeout_secs as i64)?
            .set_default("upstream.trade_limit", defaults.upstream.trade_limit as i64)?
            .set_default("cache.price_staleness_ms", defaults.cache.price_staleness_ms as i64)?
            .set_default("cache.trades_staleness_ms", defaults.cache.trades_staleness_ms as i64)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("FEEDER")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 단순 환경 변수에서 설정 로드 (`.env` 파일 포함).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로부터 설정을 구성합니다. 값이 없거나 파싱에 실패하면 기본값.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or(defaults.server.host),
                port: parse_or(&lookup, "PORT", defaults.server.port),
            },
            upstream: UpstreamConfig {
                base_url: lookup("UPSTREAM_BASE_URL").unwrap_or(defaults.upstream.base_url),
                token_address: lookup("TOKEN_ADDRESS").unwrap_or(defaults.upstream.token_address),
                api_key: lookup("UPSTREAM_API_KEY").unwrap_or(defaults.upstream.api_key),
                chain: lookup("UPSTREAM_CHAIN").unwrap_or(defaults.upstream.chain),
                timeout_secs: parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", defaults.upstream.timeout_secs),
                trade_limit: parse_or(&lookup, "TRADE_LIMIT", defaults.upstream.trade_limit),
            },
            cache: CacheConfig {
                price_staleness_ms: parse_or(
                    &lookup,
                    "PRICE_STALENESS_MS",
                    defaults.cache.price_staleness_ms,
                ),
                trades_staleness_ms: parse_or(
                    &lookup,
                    "TRADES_STALENESS_MS",
                    defaults.cache.trades_staleness_ms,
                ),
            },
            logging: LoggingConfig {
                level: lookup("RUST_LOG").unwrap_or(defaults.logging.level),
                format: lookup("LOG_FORMAT").unwrap_or(defaults.logging.format),
            },
        }
    }

    /// `FEEDER_CONFIG`가 지정되면 파일 경로로, 아니면 단순 환경 변수로 로드합니다.
    pub fn load_default() -> FeederResult<Self> {
        match std::env::var("FEEDER_CONFIG") {
            Ok(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::from_env()),
        }
    }
}

/// 값을 파싱 (실패 시 기본값 사용)
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
