use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    config,
    crawler::{finnhub::Finnhub, fugle::Fugle},
    declare::Market,
    util::http::HttpClient,
};

/// 美股即時報價
pub mod finnhub;
/// 台股即時報價
pub mod fugle;

/// 單一報價網站
#[async_trait]
pub trait StockInfo: Send + Sync {
    /// 取得股票目前的成交價
    ///
    /// `Ok(None)` 表示網站有回應但沒有價格，`Err` 表示請求失敗(逾時、非 200 等)
    async fn get_stock_price(&self, stock_symbol: &str) -> Result<Option<Decimal>>;
}

/// 依市場別取得即時報價
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, stock_symbol: &str, market: Market) -> Result<Option<Decimal>>;
}

/// 台股走 Fugle、美股走 Finnhub
pub struct Quotes {
    taiwan: Box<dyn StockInfo>,
    united_states: Box<dyn StockInfo>,
}

impl Quotes {
    pub fn new(taiwan: Box<dyn StockInfo>, united_states: Box<dyn StockInfo>) -> Self {
        Quotes {
            taiwan,
            united_states,
        }
    }

    pub fn from_config(
        client: Arc<HttpClient>,
        fugle: &config::Fugle,
        finnhub: &config::Finnhub,
    ) -> Self {
        Self::new(
            Box::new(Fugle::new(client.clone(), fugle)),
            Box::new(Finnhub::new(client, finnhub)),
        )
    }

    fn site(&self, market: Market) -> &dyn StockInfo {
        match market {
            Market::Taiwan => self.taiwan.as_ref(),
            Market::UnitedStates => self.united_states.as_ref(),
        }
    }
}

#[async_trait]
impl QuoteSource for Quotes {
    async fn fetch_quote(&self, stock_symbol: &str, market: Market) -> Result<Option<Decimal>> {
        self.site(market).get_stock_price(stock_symbol).await
    }
}

/// 上游以 0 代表查無報價，一律視為沒有價格
pub(crate) fn non_zero_price(price: Option<f64>) -> Result<Option<Decimal>> {
    match price {
        Some(p) if p != 0.0 => Ok(Some(Decimal::try_from(p)?)),
        _ => Ok(None),
    }
}
