//! 공통 값 타입.

mod decimal;

pub use decimal::*;
