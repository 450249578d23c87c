use strum::{AsRefStr, Display, EnumIter};

/// 市場別
#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone, Display, AsRefStr, EnumIter)]
pub enum Market {
    /// 台股
    #[strum(serialize = "TW")]
    Taiwan,
    /// 美股
    #[strum(serialize = "US")]
    UnitedStates,
}

impl Market {
    /// 代號第一個字元是數字就視為台股，其餘一律視為美股
    pub fn of(symbol: &str) -> Market {
        match symbol.chars().next() {
            Some(c) if c.is_ascii_digit() => Market::Taiwan,
            _ => Market::UnitedStates,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Market::Taiwan => "台股",
            Market::UnitedStates => "美股",
        }
    }
}
