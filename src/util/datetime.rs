use chrono::{DateTime, Datelike, TimeZone, Weekday};

/// A trait representing the weekend concept.
pub trait Weekend {
    /// Returns `true` if the date is on a Saturday or Sunday, and `false` otherwise.
    fn is_weekend(&self) -> bool;
}

// 以該時間本身所在的時區判斷星期幾
impl<Tz: TimeZone> Weekend for DateTime<Tz> {
    fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
