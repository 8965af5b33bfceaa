//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 업스트림 데이터 관련 오류.
///
/// 두 오류 모두 캐시 계층에서 흡수되며 HTTP 호출자에게 전파되지 않습니다.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    /// 네트워크 실패, 타임아웃, 2xx가 아닌 응답
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 전송은 성공했으나 필수 필드가 없거나 형식이 다른 응답
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl DataError {
    /// 일시적인 오류인지 확인합니다 (다음 읽기에서 재시도로 회복 가능).
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::UpstreamUnavailable(_))
    }

    /// 메트릭 라벨용 오류 종류.
    pub fn kind(&self) -> &'static str {
        match self {
            DataError::UpstreamUnavailable(_) => "upstream_unavailable",
            DataError::MalformedResponse(_) => "malformed_response",
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DataError::MalformedResponse(err.to_string())
        } else {
            // 연결 실패, 타임아웃, 본문 수신 실패
            DataError::UpstreamUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
