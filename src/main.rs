use std::sync::Arc;

use anyhow::Result;
use tokio_cron_scheduler::JobScheduler;

use crate::{
    backend::Backend, crawler::Quotes, event::price_update::PriceUpdater,
    util::http::HttpClient,
};

pub mod backend;
pub mod config;
pub mod crawler;
pub mod declare;
pub mod event;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod util;

#[cfg(all(target_os = "linux", target_env = "musl"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let app = match config::App::get() {
        Ok(app) => app,
        Err(why) => {
            logging::error_console(format!("Failed to load config because {:?}", why));
            return Err(why);
        }
    };

    let client = Arc::new(HttpClient::new(&app.http.timeout()?)?);
    let backend = Arc::new(Backend::new(client.clone(), &app.minimal, &app.update));
    let quotes = Arc::new(Quotes::from_config(client.clone(), &app.fugle, &app.finnhub));
    let updater = Arc::new(PriceUpdater::new(backend.clone(), quotes, backend));

    let mut sched = JobScheduler::new().await?;
    scheduler::start(&sched, &updater, &app.schedule).await?;

    tokio::signal::ctrl_c().await?;
    logging::info_console("Received Ctrl+C, shutting down".to_string());

    sched.shutdown().await?;
    drop(sched);
    // 排程只持有 Weak，drop updater 後 client 只剩這裡的參考(進行中的那一輪除外)
    drop(updater);
    logging::info_file_async(format!(
        "HttpClient references left: {}",
        Arc::strong_count(&client)
    ));
    drop(client);

    logging::info_console("StockPriceUpdater closed".to_string());

    Ok(())
}
