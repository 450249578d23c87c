use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Result};
use config::{Config as config_config, File as config_file};
use serde::{Deserialize, Serialize};

const CONFIG_PATH: &str = "app.json";

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct App {
    pub minimal: Minimal,
    pub fugle: Fugle,
    pub finnhub: Finnhub,
    pub update: Update,
    pub http: Http,
    pub schedule: Schedule,
}

const MINIMAL_API_URL: &str = "MINIMAL_API_URL";

/// 股票清單(含內部 id)的來源
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct Minimal {
    pub url: String,
}

const FUGLE_API_KEY: &str = "FUGLE_API_KEY";
const FUGLE_API_URL: &str = "FUGLE_API_URL";
const DEFAULT_FUGLE_API_URL: &str = "https://api.fugle.tw/marketdata/v1.0/stock/intraday/quote";

/// 台股即時報價
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Fugle {
    pub api_key: String,
    pub url: String,
}

impl Default for Fugle {
    fn default() -> Self {
        Fugle {
            api_key: String::new(),
            url: DEFAULT_FUGLE_API_URL.to_string(),
        }
    }
}

const FINNHUB_API_TOKEN: &str = "FINNHUB_API_TOKEN";
const FINNHUB_API_URL: &str = "FINNHUB_API_URL";
const DEFAULT_FINNHUB_API_URL: &str = "https://finnhub.io/api/v1/quote";

/// 美股即時報價
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Finnhub {
    pub api_token: String,
    pub url: String,
}

impl Default for Finnhub {
    fn default() -> Self {
        Finnhub {
            api_token: String::new(),
            url: DEFAULT_FINNHUB_API_URL.to_string(),
        }
    }
}

const UPDATE_API_URL: &str = "UPDATE_API_URL";

/// 接收新股價的後端
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
#[serde(default)]
pub struct Update {
    pub url: String,
}

const REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT";
const DEFAULT_REQUEST_TIMEOUT: &str = "3.05,27";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Http {
    /// 連線逾時,讀取逾時(秒)，例如 "3.05,27"
    pub request_timeout: String,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            request_timeout: DEFAULT_REQUEST_TIMEOUT.to_string(),
        }
    }
}

/// 連線與讀取的逾時設定
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RequestTimeout {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for RequestTimeout {
    fn default() -> Self {
        RequestTimeout {
            connect: Duration::from_millis(3050),
            read: Duration::from_secs(27),
        }
    }
}

impl Http {
    pub fn timeout(&self) -> Result<RequestTimeout> {
        parse_request_timeout(&self.request_timeout)
    }
}

const TAIWAN_STOCK_UPDATE_INTERVAL: &str = "TAIWAN_STOCK_UPDATE_INTERVAL";
const US_STOCK_UPDATE_INTERVAL: &str = "US_STOCK_UPDATE_INTERVAL";

/// 各市場的更新頻率(分鐘)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Schedule {
    pub taiwan_interval: u64,
    pub us_interval: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            taiwan_interval: 2,
            us_interval: 5,
        }
    }
}

impl App {
    /// 讀取設定，有 app.json 時以檔案為底再用 env 覆蓋，否則全部取自 env。
    /// 缺少必要設定時回傳錯誤。
    pub fn get() -> Result<Self> {
        let config_path = config_path();
        let app = if config_path.exists() {
            let config: App = config_config::builder()
                .add_source(config_file::from(config_path))
                .build()?
                .try_deserialize()?;
            config.override_with(|key| env::var(key).ok())?
        } else {
            App::from_lookup(|key| env::var(key).ok())?
        };

        app.validate()?;
        Ok(app)
    }

    /// 從 env (或任何 key/value 來源)中讀取設定值
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        App::default().override_with(lookup)
    }

    /// 將來自於 env 的設定值覆蓋掉 json 上的設定值
    fn override_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(MINIMAL_API_URL) {
            self.minimal.url = url;
        }

        if let Some(api_key) = lookup(FUGLE_API_KEY) {
            self.fugle.api_key = api_key;
        }

        if let Some(url) = lookup(FUGLE_API_URL) {
            self.fugle.url = url;
        }

        if let Some(api_token) = lookup(FINNHUB_API_TOKEN) {
            self.finnhub.api_token = api_token;
        }

        if let Some(url) = lookup(FINNHUB_API_URL) {
            self.finnhub.url = url;
        }

        if let Some(url) = lookup(UPDATE_API_URL) {
            self.update.url = url;
        }

        if let Some(timeout) = lookup(REQUEST_TIMEOUT) {
            self.http.request_timeout = timeout;
        }

        if let Some(minutes) = lookup(TAIWAN_STOCK_UPDATE_INTERVAL) {
            self.schedule.taiwan_interval = parse_minutes(TAIWAN_STOCK_UPDATE_INTERVAL, &minutes)?;
        }

        if let Some(minutes) = lookup(US_STOCK_UPDATE_INTERVAL) {
            self.schedule.us_interval = parse_minutes(US_STOCK_UPDATE_INTERVAL, &minutes)?;
        }

        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            (MINIMAL_API_URL, &self.minimal.url),
            (FUGLE_API_KEY, &self.fugle.api_key),
            (FINNHUB_API_TOKEN, &self.finnhub.api_token),
            (UPDATE_API_URL, &self.update.url),
            (FUGLE_API_URL, &self.fugle.url),
            (FINNHUB_API_URL, &self.finnhub.url),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();

        if !missing.is_empty() {
            bail!("Missing required settings: {}", missing.join(", "));
        }

        self.http.timeout()?;

        if self.schedule.taiwan_interval == 0 {
            bail!("{} must be greater than zero", TAIWAN_STOCK_UPDATE_INTERVAL);
        }

        if self.schedule.us_interval == 0 {
            bail!("{} must be greater than zero", US_STOCK_UPDATE_INTERVAL);
        }

        Ok(())
    }
}

fn parse_minutes(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|why| anyhow!("{} should be a number of minutes, got '{}': {}", key, value, why))
}

/// 將 "連線,讀取" 格式的字串轉成 `RequestTimeout`
pub fn parse_request_timeout(text: &str) -> Result<RequestTimeout> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [connect, read] = parts.as_slice() else {
        bail!(
            "{} should look like 'float,float', got '{}'",
            REQUEST_TIMEOUT,
            text
        );
    };

    let to_duration = |part: &str| -> Result<Duration> {
        let secs = part
            .parse::<f64>()
            .map_err(|why| anyhow!("{} has an invalid number '{}': {}", REQUEST_TIMEOUT, part, why))?;
        Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| anyhow!("{} must be positive, got '{}'", REQUEST_TIMEOUT, part))
    };

    Ok(RequestTimeout {
        connect: to_duration(*connect)?,
        read: to_duration(*read)?,
    })
}

/// 回傳設定檔的路徑
fn config_path() -> PathBuf {
    PathBuf::from(CONFIG_PATH)
}
