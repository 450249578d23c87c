use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    crawler::{finnhub::Finnhub, non_zero_price, StockInfo},
    logging,
    util::http,
};

/// Finnhub `/quote` 回應
#[derive(Deserialize, Debug, Clone)]
struct Quote {
    /// Current price
    c: Option<f64>,
}

#[async_trait]
impl StockInfo for Finnhub {
    /// 取得美股目前價格(`c`)，查無此代號時 Finnhub 會回傳 0，視為沒有價格
    async fn get_stock_price(&self, stock_symbol: &str) -> Result<Option<Decimal>> {
        if self.api_token.is_empty() {
            return Err(anyhow!("FINNHUB_API_TOKEN is not set"));
        }

        let url = http::parse_url_with_params(
            &self.url,
            &[("symbol", stock_symbol), ("token", self.api_token.as_str())],
        )?;
        let quote = self.client.get_json::<Quote>(url, None).await?;
        let price = non_zero_price(quote.c)?;

        match price {
            Some(p) => logging::info_file_async(format!("美股 {} 現在股價: {}", stock_symbol, p)),
            None => logging::warn_file_async(format!(
                "Finnhub returned no price for {}",
                stock_symbol
            )),
        }

        Ok(price)
    }
}
