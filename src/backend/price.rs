use anyhow::Result;
use concat_string::concat_string;
use rust_decimal::Decimal;

use crate::{
    logging,
    util::http::{self, HttpClient},
};

/// 以 PUT {base}/{id}/price?newPrice={price} 更新股價，僅 200 視為成功，不重試
pub async fn update(client: &HttpClient, base: &str, internal_id: &str, price: Decimal) -> Result<()> {
    let new_price = price.normalize().to_string();
    let url = http::parse_url_with_params(
        &concat_string!(
            base.trim_end_matches('/'),
            "/",
            urlencoding::encode(internal_id),
            "/price"
        ),
        &[("newPrice", new_price.as_str())],
    )?;

    client.put(url).await?;

    logging::info_file_async(format!(
        "Updated the price of {} to {}",
        internal_id, new_price
    ));

    Ok(())
}
