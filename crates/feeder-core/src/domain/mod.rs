//! 가격/거래 피드를 위한 도메인 모델.

mod market_data;
mod trade;

pub use market_data::*;
pub use trade::*;
