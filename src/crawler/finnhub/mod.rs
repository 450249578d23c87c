//! # Finnhub 美股即時報價
//!
//! - 存取方式：HTTP GET，API token 以 `token` query 參數傳遞
//! - 主要端點：`/api/v1/quote?symbol={symbol}&token={token}`
//! - 取用欄位：`c`（目前價格）

use std::sync::Arc;

use crate::{config, util::http::HttpClient};

/// Finnhub 即時報價子模組。
pub mod price;

pub struct Finnhub {
    client: Arc<HttpClient>,
    api_token: String,
    url: String,
}

impl Finnhub {
    pub fn new(client: Arc<HttpClient>, settings: &config::Finnhub) -> Self {
        Finnhub {
            client,
            api_token: settings.api_token.trim().to_string(),
            url: settings.url.clone(),
        }
    }
}
