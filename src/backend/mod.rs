//! 後端 API：股票清單(含內部 id)與更新股價

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{config, util::http::HttpClient};

pub use self::catalog::{Catalog, Instrument};

/// 股票清單
pub mod catalog;
/// 更新股價
pub mod price;

/// 股票清單的來源
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Catalog>;
}

/// 接收新股價的一方
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn push_price(&self, internal_id: &str, price: Decimal) -> Result<()>;
}

pub struct Backend {
    client: Arc<HttpClient>,
    catalog_url: String,
    update_url: String,
}

impl Backend {
    pub fn new(client: Arc<HttpClient>, minimal: &config::Minimal, update: &config::Update) -> Self {
        Backend {
            client,
            catalog_url: minimal.url.clone(),
            update_url: update.url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CatalogSource for Backend {
    async fn fetch_catalog(&self) -> Result<Catalog> {
        catalog::fetch(&self.client, &self.catalog_url).await
    }
}

#[async_trait]
impl PriceStore for Backend {
    async fn push_price(&self, internal_id: &str, price: Decimal) -> Result<()> {
        price::update(&self.client, &self.update_url, internal_id, price).await
    }
}
