//! 업스트림 가격 API 클라이언트.
//!
//! 토큰 단가와 최근 거래 내역을 REST API로 조회합니다.
//!
//! # 엔드포인트
//!
//! - `GET /defi/price?address=...` → `{"success": true, "data": {"value": 1.23}}`
//! - `GET /defi/txs/token?address=...&limit=N` →
//!   `{"success": true, "data": {"items": [{"blockUnixTime", "txType", "amountInUsd", "priceUsd"}]}}`
//!
//! # 응답 검증
//!
//! - 가격 값(`data.value`)이 없으면 `MalformedResponse`
//! - 거래 목록(`data.items`)이 비어 있으면 정상 (거래 없음)
//! - 개별 거래의 숫자 필드가 없으면 해당 필드만 0으로 대체
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use feeder_core::UpstreamConfig;
//! use feeder_data::provider::UpstreamClient;
//!
//! let client = UpstreamClient::new(&UpstreamConfig::default())?;
//! let price = client.fetch_price().await?;
//! let trades = client.fetch_trades(10).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feeder_core::{decimal_from_json, latest_first, PriceSnapshot, TradeKind, TradeRecord, UpstreamConfig};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{DataError, Result};
use crate::provider::MarketDataSource;

/// 오류 메시지에 포함할 응답 본문 최대 길이.
const MAX_ERROR_BODY: usize = 200;

/// 업스트림 API 클라이언트.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    token_address: String,
    api_key: String,
    chain: String,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // API 키는 출력하지 않음
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .field("token_address", &self.token_address)
            .field("chain", &self.chain)
            .finish()
    }
}

/// API 응답 래퍼.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: Option<bool>,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTradePage {
    items: Option<Vec<Value>>,
}

/// 개별 거래 원본. 모든 필드를 `Value`로 받아 객체 항목의 역직렬화가 실패하지 않게 합니다.
#[derive(Debug, Default, Deserialize)]
struct RawTrade {
    #[serde(rename = "blockUnixTime", default)]
    block_unix_time: Option<Value>,
    #[serde(rename = "txType", default)]
    tx_type: Option<Value>,
    #[serde(rename = "amountInUsd", default)]
    amount_in_usd: Option<Value>,
    #[serde(rename = "priceUsd", default)]
    price_usd: Option<Value>,
}

impl RawTrade {
    fn into_record(self) -> TradeRecord {
        let occurred_at = self
            .block_unix_time
            .as_ref()
            .and_then(parse_unix_seconds)
            .unwrap_or_default();
        let kind = TradeKind::from_upstream(
            self.tx_type.as_ref().and_then(Value::as_str).unwrap_or_default(),
        );
        let value_usd = self
            .amount_in_usd
            .as_ref()
            .and_then(decimal_from_json)
            .unwrap_or(Decimal::ZERO);
        let price_usd = self
            .price_usd
            .as_ref()
            .and_then(decimal_from_json)
            .unwrap_or(Decimal::ZERO);

        TradeRecord::new(occurred_at, kind, value_usd, price_usd)
    }
}

impl UpstreamClient {
    /// 새로운 업스트림 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트(TLS 백엔드) 초기화에 실패하면 `UpstreamUnavailable`.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DataError::UpstreamUnavailable(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_address: config.token_address.clone(),
            api_key: config.api_key.clone(),
            chain: config.chain.clone(),
        })
    }

    /// 기본 URL 변경 (테스트/프록시용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// 추적 중인 토큰 주소.
    pub fn token_address(&self) -> &str {
        &self.token_address
    }

    /// API 요청 실행 후 `data` 필드 반환.
    ///
    /// API 키는 `X-API-KEY` 헤더로 전달합니다.
    async fn request<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(url = %url, "업스트림 API 요청");

        // 전송 실패는 UpstreamUnavailable, 본문 디코딩 실패는 MalformedResponse
        let response = self
            .client
            .get(&url)
            .query(params)
            .header("X-API-KEY", &self.api_key)
            .header("x-chain", &self.chain)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::UpstreamUnavailable(format!(
                "{} 응답 오류 [{}]: {}",
                path,
                status,
                truncate(&body, MAX_ERROR_BODY)
            )));
        }

        let parsed: ApiResponse<T> = response.json().await?;

        if parsed.success == Some(false) {
            return Err(DataError::MalformedResponse(format!(
                "{} success=false: {}",
                path,
                parsed.message.unwrap_or_default()
            )));
        }

        parsed
            .data
            .ok_or_else(|| DataError::MalformedResponse(format!("{} 응답에 data 필드 없음", path)))
    }
}

#[async_trait]
impl MarketDataSource for UpstreamClient {
    #[instrument(skip(self), fields(address = %self.token_address))]
    async fn fetch_price(&self) -> Result<PriceSnapshot> {
        let params = [("address", self.token_address.clone())];
        let raw: RawPrice = self.request("/defi/price", &params).await?;

        let price = raw
            .value
            .as_ref()
            .and_then(decimal_from_json)
            .ok_or_else(|| DataError::MalformedResponse("가격 값(data.value) 없음".to_string()))?;

        debug!(price = %price, "가격 조회 완료");
        Ok(PriceSnapshot::new(price))
    }

    #[instrument(skip(self), fields(address = %self.token_address))]
    async fn fetch_trades(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let params = [
            ("address", self.token_address.clone()),
            ("limit", limit.to_string()),
            ("tx_type", "swap".to_string()),
        ];
        let page: RawTradePage = self.request("/defi/txs/token", &params).await?;

        let items = page
            .items
            .ok_or_else(|| DataError::MalformedResponse("거래 목록(data.items) 없음".to_string()))?;

        let total = items.len();
        let records: Vec<TradeRecord> = items
            .into_iter()
            .filter(Value::is_object)
            .map(|item| serde_json::from_value::<RawTrade>(item).unwrap_or_default())
            .map(RawTrade::into_record)
            .collect();

        if records.len() < total {
            debug!(skipped = total - records.len(), "객체가 아닌 거래 항목 무시");
        }

        let trades = latest_first(records, limit);
        debug!(count = trades.len(), "거래 내역 조회 완료");
        Ok(trades)
    }
}

/// 유닉스 초(숫자 또는 문자열)를 UTC 시각으로 변환.
fn parse_unix_seconds(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
