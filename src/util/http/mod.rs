use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use reqwest::{header::HeaderMap, Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{config::RequestTimeout, logging::Logger};

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// HTTP 請求失敗的類型
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to decode the response of {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl HttpError {
    fn from_reqwest(url: String, why: reqwest::Error) -> Self {
        if why.is_timeout() {
            HttpError::Timeout { url }
        } else {
            HttpError::Transport { url, source: why }
        }
    }

    /// 上游回應的狀態碼，若錯誤並非來自非 200 的回應則為 None
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 讓 reqwest 使用 ring 作為 TLS 的加密實作，重複呼叫無副作用
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// 整個服務共用的 HTTP client
///
/// 啟動時建立一次並以 `Arc` 傳給各個 API 的呼叫端，drop 時關閉所有連線。
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: &RequestTimeout) -> Result<Self> {
        install_crypto_provider();

        let client = Client::builder()
            // ===== 壓縮 =====
            .brotli(true)
            .gzip(true)
            .zstd(true)
            // ===== 超時設置 =====
            .connect_timeout(timeout.connect)
            .read_timeout(timeout.read)
            // ===== TCP 優化 =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== 連接池 =====
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))?;

        Ok(HttpClient { client })
    }

    /// 發出 GET 並把 200 的回應內容轉成 `RES`
    pub async fn get_json<RES: DeserializeOwned>(
        &self,
        url: Url,
        headers: Option<HeaderMap>,
    ) -> Result<RES, HttpError> {
        let log_url = loggable(&url);
        self.send(Method::GET, url, headers)
            .await?
            .json::<RES>()
            .await
            .map_err(|why| HttpError::Decode {
                url: log_url,
                source: why,
            })
    }

    /// 發出 PUT，僅 200 視為成功
    pub async fn put(&self, url: Url) -> Result<Response, HttpError> {
        self.send(Method::PUT, url, None).await
    }

    /// 送出請求，不重試；非 200 的回應轉成 `HttpError::Status`
    ///
    /// 日誌只記錄 host 與 path，query string 可能帶有 token
    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: Option<HeaderMap>,
    ) -> Result<Response, HttpError> {
        let log_url = loggable(&url);
        let visit_log = format!("{}:{}", method, log_url);
        let mut rb = self.client.request(method, url);

        if let Some(h) = headers {
            rb = rb.headers(h);
        }

        let start = Instant::now();
        let res = rb.send().await;
        let elapsed = start.elapsed().as_millis();

        match res {
            Ok(response) if response.status() == StatusCode::OK => {
                LOGGER.debug(format!("{} {} {} ms", visit_log, response.status(), elapsed));
                Ok(response)
            }
            Ok(response) => {
                LOGGER.warn(format!("{} {} {} ms", visit_log, response.status(), elapsed));
                Err(HttpError::Status {
                    url: log_url,
                    status: response.status(),
                })
            }
            Err(why) => {
                LOGGER.error(format!("{} failed because {:?}. {} ms", visit_log, why, elapsed));
                Err(HttpError::from_reqwest(log_url, why))
            }
        }
    }
}

/// 解析網址，失敗時轉成 `HttpError::InvalidUrl`
pub fn parse_url(url: &str) -> Result<Url, HttpError> {
    Url::parse(url).map_err(|why| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: why.to_string(),
    })
}

/// 解析網址並附加 query string
pub fn parse_url_with_params(url: &str, params: &[(&str, &str)]) -> Result<Url, HttpError> {
    Url::parse_with_params(url, params).map_err(|why| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: why.to_string(),
    })
}

/// 去掉 query 與帳密，避免 token 寫進日誌
fn loggable(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port().map(|p| format!(":{}", p)).unwrap_or_default()
    ) + url.path()
}
