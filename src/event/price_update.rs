use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    backend::{Catalog, CatalogSource, PriceStore},
    crawler::QuoteSource,
    declare::Market,
    logging,
    session::{is_taiwan_session_open, is_us_session_open},
};

/// 一輪更新涵蓋的市場
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    All,
    Market(Market),
}

impl Scope {
    pub fn covers(&self, market: Market) -> bool {
        match self {
            Scope::All => true,
            Scope::Market(m) => *m == market,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "{}+{}", Market::Taiwan, Market::UnitedStates),
            Scope::Market(m) => write!(f, "{}", m),
        }
    }
}

/// 單一股票在這一輪的結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Updated(Decimal),
    /// 非交易時間，沒有發出任何報價請求
    MarketClosed,
    /// 報價網站有回應但沒有價格
    NoQuote,
    /// 報價請求失敗(逾時、非 200 等)
    QuoteFailed,
    /// 清單中找不到對應的 id
    Unresolved,
    PushFailed,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, matches: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| matches(o)).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total:{} updated:{} closed:{} no_quote:{} quote_failed:{} unresolved:{} push_failed:{}",
            self.outcomes.len(),
            self.count(|o| matches!(o, Outcome::Updated(_))),
            self.count(|o| *o == Outcome::MarketClosed),
            self.count(|o| *o == Outcome::NoQuote),
            self.count(|o| *o == Outcome::QuoteFailed),
            self.count(|o| *o == Outcome::Unresolved),
            self.count(|o| *o == Outcome::PushFailed),
        )
    }
}

/// 取得股票清單後，對每一檔股票各自：判斷市場 → 檢查交易時段 → 取得報價 → 查 id → 更新股價
///
/// 各檔股票同時進行，任何一檔失敗或略過都不影響其他股票。
pub struct PriceUpdater {
    catalog: Arc<dyn CatalogSource>,
    quotes: Arc<dyn QuoteSource>,
    store: Arc<dyn PriceStore>,
}

impl PriceUpdater {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        quotes: Arc<dyn QuoteSource>,
        store: Arc<dyn PriceStore>,
    ) -> Self {
        PriceUpdater {
            catalog,
            quotes,
            store,
        }
    }

    pub async fn execute(&self, scope: Scope) -> Result<CycleReport> {
        self.run_at(scope, Utc::now()).await
    }

    /// 以 `now` 判斷交易時段執行一輪更新；取得清單失敗時整輪中止，不發出任何報價或更新請求
    pub async fn run_at(&self, scope: Scope, now: DateTime<Utc>) -> Result<CycleReport> {
        logging::info_file_async(format!("=== 開始更新股票價格({}) ===", scope));

        let catalog = self
            .catalog
            .fetch_catalog()
            .await
            .with_context(|| format!("Failed to fetch the stock list({})", scope))?;

        if catalog.is_empty() {
            logging::warn_file_async(format!("股票清單為空, 跳過此次更新({})", scope));
            return Ok(CycleReport::default());
        }

        let symbols: Vec<&str> = catalog
            .symbols()
            .into_iter()
            .filter(|symbol| scope.covers(Market::of(symbol)))
            .collect();
        logging::debug_file_async(format!("{}: {:?}", scope, symbols));

        let futures = symbols
            .into_iter()
            .map(|symbol| self.process(symbol, &catalog, now))
            .collect::<Vec<_>>();
        let report = CycleReport {
            outcomes: futures::future::join_all(futures).await,
        };

        logging::info_file_async(format!("=== 股票價格更新完成({}) {} ===", scope, report));

        Ok(report)
    }

    async fn process(&self, symbol: &str, catalog: &Catalog, now: DateTime<Utc>) -> (String, Outcome) {
        let outcome = self.update_symbol(symbol, catalog, now).await;
        (symbol.to_string(), outcome)
    }

    async fn update_symbol(&self, symbol: &str, catalog: &Catalog, now: DateTime<Utc>) -> Outcome {
        let market = Market::of(symbol);
        let session_open = match market {
            Market::Taiwan => is_taiwan_session_open(&now),
            Market::UnitedStates => is_us_session_open(&now),
        };
        if !session_open {
            logging::info_file_async(format!("{} {} 非交易時間, 略過", market.name(), symbol));
            return Outcome::MarketClosed;
        }

        logging::info_file_async(format!("更新{} {}", market.name(), symbol));

        let price = match self.quotes.fetch_quote(symbol, market).await {
            Ok(Some(price)) => price,
            Ok(None) => {
                logging::error_file_async(format!("{} 無法取得股價, 略過更新", symbol));
                return Outcome::NoQuote;
            }
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to fetch the quote of {}({}) because {:?}",
                    symbol, market, why
                ));
                return Outcome::QuoteFailed;
            }
        };

        let Some(internal_id) = catalog.resolve_id(symbol) else {
            logging::error_file_async(format!("{} 的 stock_id 為 None, 無法更新", symbol));
            return Outcome::Unresolved;
        };

        match self.store.push_price(internal_id, price).await {
            Ok(()) => {
                logging::info_file_async(format!(
                    "成功更新 {} (ID: {}) 股價為 {}",
                    symbol, internal_id, price
                ));
                Outcome::Updated(price)
            }
            Err(why) => {
                logging::error_file_async(format!(
                    "Failed to update the price of {}(ID: {}) because {:?}",
                    symbol, internal_id, why
                ));
                Outcome::PushFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::Asia::Taipei;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::backend::Instrument;

    struct FakeCatalog {
        instruments: Option<Vec<Instrument>>,
        calls: AtomicUsize,
    }

    impl FakeCatalog {
        fn with(entries: &[(&str, Option<&str>)]) -> Self {
            FakeCatalog {
                instruments: Some(
                    entries
                        .iter()
                        .map(|(symbol, id)| Instrument {
                            symbol: symbol.to_string(),
                            internal_id: id.map(str::to_string),
                        })
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            FakeCatalog {
                instruments: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn fetch_catalog(&self) -> Result<Catalog> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.instruments
                .clone()
                .map(Catalog::new)
                .ok_or_else(|| anyhow!("connection refused"))
        }
    }

    /// 未設定價格的代號回傳錯誤
    #[derive(Default)]
    struct FakeQuotes {
        prices: HashMap<String, Option<Decimal>>,
        delay: Option<Duration>,
        asked: Mutex<Vec<(String, Market)>>,
    }

    impl FakeQuotes {
        fn with(prices: &[(&str, Option<Decimal>)]) -> Self {
            FakeQuotes {
                prices: prices
                    .iter()
                    .map(|(symbol, price)| (symbol.to_string(), *price))
                    .collect(),
                ..Default::default()
            }
        }

        fn asked(&self) -> Vec<String> {
            let mut asked: Vec<String> = self
                .asked
                .lock()
                .unwrap()
                .iter()
                .map(|(symbol, _)| symbol.clone())
                .collect();
            asked.sort();
            asked
        }
    }

    #[async_trait]
    impl QuoteSource for FakeQuotes {
        async fn fetch_quote(&self, stock_symbol: &str, market: Market) -> Result<Option<Decimal>> {
            self.asked
                .lock()
                .unwrap()
                .push((stock_symbol.to_string(), market));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.prices
                .get(stock_symbol)
                .copied()
                .ok_or_else(|| anyhow!("{} responded with status 500", stock_symbol))
        }
    }

    #[derive(Default)]
    struct FakeStore {
        rejected: Vec<String>,
        pushed: Mutex<Vec<(String, Decimal)>>,
    }

    impl FakeStore {
        fn pushed(&self) -> Vec<(String, Decimal)> {
            let mut pushed = self.pushed.lock().unwrap().clone();
            pushed.sort_by(|a, b| a.0.cmp(&b.0));
            pushed
        }
    }

    #[async_trait]
    impl PriceStore for FakeStore {
        async fn push_price(&self, internal_id: &str, price: Decimal) -> Result<()> {
            if self.rejected.iter().any(|id| id == internal_id) {
                return Err(anyhow!("{} responded with status 404", internal_id));
            }

            self.pushed
                .lock()
                .unwrap()
                .push((internal_id.to_string(), price));
            Ok(())
        }
    }

    fn updater(
        catalog: &Arc<FakeCatalog>,
        quotes: &Arc<FakeQuotes>,
        store: &Arc<FakeStore>,
    ) -> PriceUpdater {
        PriceUpdater::new(catalog.clone(), quotes.clone(), store.clone())
    }

    /// 2025-03-12(三) 10:00 台北：台股開盤、美股收盤
    fn taiwan_open() -> DateTime<Utc> {
        Taipei
            .with_ymd_and_hms(2025, 3, 12, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    /// 2025-01-14(二) 23:00 台北：台股收盤、美股開盤
    fn us_open() -> DateTime<Utc> {
        Taipei
            .with_ymd_and_hms(2025, 1, 14, 23, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_closed_market_is_skipped_without_quote_request() {
        let catalog = Arc::new(FakeCatalog::with(&[("2330", Some("A1")), ("AAPL", Some("B2"))]));
        let quotes = Arc::new(FakeQuotes::with(&[
            ("2330", Some(dec!(1025))),
            ("AAPL", Some(dec!(227.5))),
        ]));
        let store = Arc::new(FakeStore::default());

        let report = updater(&catalog, &quotes, &store)
            .run_at(Scope::All, us_open())
            .await
            .unwrap();

        assert_eq!(report.outcome("2330"), Some(&Outcome::MarketClosed));
        assert_eq!(report.outcome("AAPL"), Some(&Outcome::Updated(dec!(227.5))));
        assert_eq!(quotes.asked(), vec!["AAPL"]);
        assert_eq!(store.pushed(), vec![("B2".to_string(), dec!(227.5))]);
    }

    #[tokio::test]
    async fn test_quote_failure_does_not_affect_other_symbols() {
        let catalog = Arc::new(FakeCatalog::with(&[
            ("2330", Some("A1")),
            ("2317", Some("A2")),
            ("0050", Some("A3")),
            ("AAPL", Some("B2")),
        ]));
        // 2317 沒有設定價格，模擬非 200 的回應
        let quotes = Arc::new(FakeQuotes::with(&[
            ("2330", Some(dec!(1025))),
            ("0050", Some(dec!(187.45))),
        ]));
        let store = Arc::new(FakeStore::default());

        let report = updater(&catalog, &quotes, &store)
            .run_at(Scope::All, taiwan_open())
            .await
            .unwrap();

        assert_eq!(report.outcome("2317"), Some(&Outcome::QuoteFailed));
        assert_eq!(report.outcome("2330"), Some(&Outcome::Updated(dec!(1025))));
        assert_eq!(report.outcome("0050"), Some(&Outcome::Updated(dec!(187.45))));
        assert_eq!(report.outcome("AAPL"), Some(&Outcome::MarketClosed));
        assert_eq!(quotes.asked(), vec!["0050", "2317", "2330"]);
        assert_eq!(
            store.pushed(),
            vec![
                ("A1".to_string(), dec!(1025)),
                ("A3".to_string(), dec!(187.45))
            ]
        );
    }

    #[tokio::test]
    async fn test_catalog_failure_stops_the_cycle() {
        let catalog = Arc::new(FakeCatalog::failing());
        let quotes = Arc::new(FakeQuotes::default());
        let store = Arc::new(FakeStore::default());

        let result = updater(&catalog, &quotes, &store)
            .run_at(Scope::All, taiwan_open())
            .await;

        assert!(result.is_err());
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
        assert!(quotes.asked().is_empty());
        assert!(store.pushed().is_empty());
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let catalog = Arc::new(FakeCatalog::with(&[]));
        let quotes = Arc::new(FakeQuotes::default());
        let store = Arc::new(FakeStore::default());

        let report = updater(&catalog, &quotes, &store)
            .run_at(Scope::All, taiwan_open())
            .await
            .unwrap();

        assert!(report.outcomes.is_empty());
        assert!(quotes.asked().is_empty());
    }

    #[tokio::test]
    async fn test_no_quote_unresolved_and_push_failure() {
        let catalog = Arc::new(FakeCatalog::with(&[
            ("2330", Some("A1")),
            ("2454", None),
            ("2603", Some("A4")),
            ("3008", Some("A5")),
        ]));
        let quotes = Arc::new(FakeQuotes::with(&[
            ("2330", None),
            ("2454", Some(dec!(1340))),
            ("2603", Some(dec!(181.5))),
            ("3008", Some(dec!(2385))),
        ]));
        let store = Arc::new(FakeStore {
            rejected: vec!["A4".to_string()],
            ..Default::default()
        });

        let report = updater(&catalog, &quotes, &store)
            .run_at(Scope::All, taiwan_open())
            .await
            .unwrap();

        assert_eq!(report.outcome("2330"), Some(&Outcome::NoQuote));
        assert_eq!(report.outcome("2454"), Some(&Outcome::Unresolved));
        assert_eq!(report.outcome("2603"), Some(&Outcome::PushFailed));
        assert_eq!(report.outcome("3008"), Some(&Outcome::Updated(dec!(2385))));
        assert_eq!(store.pushed(), vec![("A5".to_string(), dec!(2385))]);
        assert_eq!(
            report.to_string(),
            "total:4 updated:1 closed:0 no_quote:1 quote_failed:0 unresolved:1 push_failed:1"
        );
    }

    #[tokio::test]
    async fn test_scope_limits_symbols() {
        let catalog = Arc::new(FakeCatalog::with(&[("2330", Some("A1")), ("AAPL", Some("B2"))]));
        let quotes = Arc::new(FakeQuotes::with(&[
            ("2330", Some(dec!(1025))),
            ("AAPL", Some(dec!(227.5))),
        ]));
        let store = Arc::new(FakeStore::default());

        let report = updater(&catalog, &quotes, &store)
            .run_at(Scope::Market(Market::Taiwan), us_open())
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcome("2330"), Some(&Outcome::MarketClosed));
        assert_eq!(report.outcome("AAPL"), None);
        assert!(quotes.asked().is_empty());
    }

    #[tokio::test]
    async fn test_symbols_run_concurrently() {
        let symbols = ["2330", "2317", "2454", "2603", "3008"];
        let entries: Vec<(&str, Option<&str>)> = symbols.iter().map(|s| (*s, Some(*s))).collect();
        let prices: Vec<(&str, Option<Decimal>)> =
            symbols.iter().map(|s| (*s, Some(dec!(100)))).collect();

        let catalog = Arc::new(FakeCatalog::with(&entries));
        let quotes = Arc::new(FakeQuotes {
            delay: Some(Duration::from_millis(200)),
            ..FakeQuotes::with(&prices)
        });
        let store = Arc::new(FakeStore::default());

        let start = tokio::time::Instant::now();
        let report = updater(&catalog, &quotes, &store)
            .run_at(Scope::All, taiwan_open())
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_millis(800));
        assert_eq!(store.pushed().len(), symbols.len());
        assert_eq!(report.outcomes.len(), symbols.len());
    }

    #[test]
    fn test_scope() {
        assert!(Scope::All.covers(Market::Taiwan));
        assert!(Scope::All.covers(Market::UnitedStates));
        assert!(Scope::Market(Market::Taiwan).covers(Market::Taiwan));
        assert!(!Scope::Market(Market::Taiwan).covers(Market::UnitedStates));
        assert_eq!(Scope::All.to_string(), "TW+US");
        assert_eq!(Scope::Market(Market::UnitedStates).to_string(), "US");
    }
}
