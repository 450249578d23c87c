/// 依交易時段更新台股與美股的即時股價
pub mod price_update;
