//! 서비스 공통 에러 타입.
//!
//! 업스트림 관련 에러는 `feeder-data`의 `DataError`에서 다룹니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum FeederError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 서비스 작업을 위한 Result 타입.
pub type FeederResult<T> = Result<T, FeederError>;

impl From<config::ConfigError> for FeederError {
    fn from(err: config::ConfigError) -> Self {
        FeederError::Config(err.to_string())
    }
}
