use anyhow::{anyhow, Result};
use async_trait::async_trait;
use concat_string::concat_string;
use reqwest::header::{self, HeaderValue};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    crawler::{fugle::Fugle, non_zero_price, StockInfo},
    logging,
    util::http,
};

/// Fugle 日內即時報價回應，僅保留抓價所需欄位。
#[derive(Deserialize, Debug, Clone)]
struct Quote {
    /// 最後一筆成交價（含試撮）。
    #[serde(rename = "lastPrice")]
    last_price: Option<f64>,
}

impl Fugle {
    /// 建立 Fugle API 請求標頭。
    fn build_headers(&self) -> Result<header::HeaderMap> {
        if self.api_key.is_empty() {
            return Err(anyhow!("FUGLE_API_KEY is not set"));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert("X-API-KEY", HeaderValue::from_str(&self.api_key)?);
        Ok(headers)
    }

    /// 向 Fugle 取得指定股票代碼的日內即時報價原始資料。
    async fn fetch_data(&self, stock_symbol: &str) -> Result<Quote> {
        let url = http::parse_url(&concat_string!(
            self.url,
            "/",
            urlencoding::encode(stock_symbol)
        ))?;

        Ok(self
            .client
            .get_json::<Quote>(url, Some(self.build_headers()?))
            .await?)
    }
}

#[async_trait]
impl StockInfo for Fugle {
    /// 取得指定台股的最後成交價(`lastPrice`)。
    ///
    /// # 參數
    /// * `stock_symbol` - 台股股票代碼（例如：`2330`）。
    ///
    /// # 回傳
    /// * `Ok(None)` - 回應中沒有 `lastPrice`（例如盤前尚無成交）。
    /// * `Err` - API 金鑰缺失、HTTP 或解析錯誤。
    async fn get_stock_price(&self, stock_symbol: &str) -> Result<Option<Decimal>> {
        let quote = self.fetch_data(stock_symbol).await?;
        let price = non_zero_price(quote.last_price)?;

        match price {
            Some(p) => logging::info_file_async(format!("台股 {} 現在股價: {}", stock_symbol, p)),
            None => logging::warn_file_async(format!(
                "Fugle returned no lastPrice for {}",
                stock_symbol
            )),
        }

        Ok(price)
    }
}
