use anyhow::Result;
use hashbrown::HashSet;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    logging,
    util::http::{self, HttpClient},
};

/// 清單 API 回傳的單筆資料，`name` 的格式為 "代號: 說明"
#[derive(Deserialize, Debug, Clone)]
struct Item {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "_id", default)]
    underscore_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

impl Item {
    /// 以 `_id` 為準，沒有時才用 `id`
    fn internal_id(&self) -> Option<String> {
        self.underscore_id
            .as_ref()
            .and_then(id_to_string)
            .or_else(|| self.id.as_ref().and_then(id_to_string))
    }
}

/// 追蹤中的股票
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    /// 後端用來更新股價的 id
    pub internal_id: Option<String>,
}

/// 某一時刻的股票清單快照，同一輪更新的分類與 id 查詢都使用同一份
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    instruments: Vec<Instrument>,
}

impl Catalog {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Catalog { instruments }
    }

    fn from_items(items: Vec<Item>) -> Self {
        let instruments = items
            .into_iter()
            .filter_map(|item| {
                let internal_id = item.internal_id();
                let name = item.name?;
                let symbol = symbol_of(&name);
                if symbol.is_empty() {
                    logging::warn_file_async(format!("Skip a catalog entry without symbol: {}", name));
                    return None;
                }

                Some(Instrument {
                    symbol: symbol.to_string(),
                    internal_id,
                })
            })
            .collect();

        Catalog { instruments }
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// 清單中的股票代號，依清單順序且不重複
    pub fn symbols(&self) -> Vec<&str> {
        let mut seen = HashSet::with_capacity(self.instruments.len());
        self.instruments
            .iter()
            .map(|instrument| instrument.symbol.as_str())
            .filter(|symbol| seen.insert(*symbol))
            .collect()
    }

    /// 以代號找出後端的 id
    pub fn resolve_id(&self, symbol: &str) -> Option<&str> {
        self.instruments
            .iter()
            .filter(|instrument| instrument.symbol == symbol)
            .find_map(|instrument| instrument.internal_id.as_deref())
    }
}

/// 取出 "代號: 說明" 冒號左側的代號
pub fn symbol_of(name: &str) -> &str {
    name.split(':').next().unwrap_or_default().trim()
}

fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 向清單 API 取得完整的股票清單
pub async fn fetch(client: &HttpClient, url: &str) -> Result<Catalog> {
    let url = http::parse_url(url)?;
    let items = client.get_json::<Vec<Item>>(url, None).await?;
    let catalog = Catalog::from_items(items);

    logging::info_file_async(format!("取得 {} 檔股票清單", catalog.len()));

    Ok(catalog)
}
