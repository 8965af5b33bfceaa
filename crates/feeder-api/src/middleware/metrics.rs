//! HTTP 요청 metrics middleware.
//!
//! 요청 수와 처리 시간에 더해, 응답의 `x-cache-status` 헤더를 읽어
//! 캐시 출처(`served_from`)별 응답 수를 집계합니다.

use axum::{extract::Request, middleware::Next, response::Response};
use feeder_data::ServedFrom;
use std::time::Instant;

use crate::metrics::{
    normalize_path, record_http_duration, record_http_request, record_http_response,
};
use crate::routes::CACHE_STATUS_HEADER;

/// 캐시를 거치지 않은 응답의 라벨.
const NOT_CACHED: &str = "none";

/// HTTP 메트릭을 수집하는 미들웨어 레이어.
///
/// - `http_requests_total`: method, path
/// - `http_responses_total`: method, path, status, served_from
/// - `http_request_duration_seconds`: method, path
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    record_http_request(&method, path);

    let response = next.run(request).await;

    record_http_response(
        &method,
        path,
        response.status().as_u16(),
        served_from_label(&response),
    );
    record_http_duration(&method, path, start.elapsed().as_secs_f64());

    response
}

/// 응답 헤더에서 캐시 출처 라벨 추출.
///
/// 알려진 값(`fresh`/`stale`/`empty`)만 라벨로 쓰고 나머지는 `none`입니다.
pub fn served_from_label(response: &Response) -> &'static str {
    let Some(value) = response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return NOT_CACHED;
    };

    [ServedFrom::Fresh, ServedFrom::Stale, ServedFrom::Empty]
        .into_iter()
        .map(|s| s.as_str())
        .find(|label| *label == value)
        .unwrap_or(NOT_CACHED)
}
