//! # Fugle 台股即時報價
//!
//! - 存取方式：HTTP GET 搭配 `X-API-KEY` 標頭
//! - 主要端點：`/marketdata/v1.0/stock/intraday/quote/{symbol}`
//! - 取用欄位：`lastPrice`

use std::sync::Arc;

use crate::{config, util::http::HttpClient};

/// Fugle 即時報價子模組。
pub mod price;

/// Fugle 行情採集器。
pub struct Fugle {
    client: Arc<HttpClient>,
    api_key: String,
    /// 不含股票代碼的端點，例如 `https://api.fugle.tw/marketdata/v1.0/stock/intraday/quote`
    url: String,
}

impl Fugle {
    pub fn new(client: Arc<HttpClient>, settings: &config::Fugle) -> Self {
        Fugle {
            client,
            api_key: settings.api_key.trim().to_string(),
            url: settings.url.trim_end_matches('/').to_string(),
        }
    }
}
