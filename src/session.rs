//! 交易時段判斷
//!
//! 每個市場的交易時段以「交易所當地時間」定義，判斷時先把傳入的時間點換算到該時區，
//! 星期與時刻都以當地為準，因此美股的夏令時間由 `chrono-tz` 自動處理。

use chrono::{DateTime, NaiveTime, TimeZone};
use chrono_tz::{America::New_York, Asia::Taipei, Tz};

use crate::{declare::Market, util::datetime::Weekend};

#[derive(Debug, Clone, PartialEq)]
pub struct TradingSession {
    pub timezone: Tz,
    /// 開盤時間(含)
    pub open: NaiveTime,
    /// 收盤時間(含)
    pub close: NaiveTime,
}

impl TradingSession {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Self {
        TradingSession {
            timezone,
            open,
            close,
        }
    }

    /// 台股 09:00:00 - 13:30:00 (Asia/Taipei)
    pub fn taiwan() -> Self {
        Self::new(Taipei, hm(9, 0), hm(13, 30))
    }

    /// 美股 09:30:00 - 16:00:00 (America/New_York)
    ///
    /// 換算成台北時間為冬令 22:30 - 05:00、夏令 21:30 - 04:00
    pub fn united_states() -> Self {
        Self::new(New_York, hm(9, 30), hm(16, 0))
    }

    pub fn of(market: Market) -> Self {
        match market {
            Market::Taiwan => Self::taiwan(),
            Market::UnitedStates => Self::united_states(),
        }
    }

    /// `now` 在當地是否為平日且落在交易時段內
    ///
    /// 開盤時間晚於收盤時間時視為跨午夜的時段(`t >= open || t <= close`)
    pub fn is_open<T: TimeZone>(&self, now: &DateTime<T>) -> bool {
        let local = now.with_timezone(&self.timezone);
        if local.is_weekend() {
            return false;
        }

        let t = local.time();
        if self.open <= self.close {
            t >= self.open && t <= self.close
        } else {
            t >= self.open || t <= self.close
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// 目前是否為台股交易時間
pub fn is_taiwan_session_open<T: TimeZone>(now: &DateTime<T>) -> bool {
    TradingSession::of(Market::Taiwan).is_open(now)
}

/// 目前是否為美股交易時間
pub fn is_us_session_open<T: TimeZone>(now: &DateTime<T>) -> bool {
    TradingSession::of(Market::UnitedStates).is_open(now)
}
