use std::{
    env,
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::{Error, Result};
use tokio::{sync::Mutex, task};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    config,
    declare::Market,
    event::price_update::{PriceUpdater, Scope},
    logging,
};

/// 啟動排程，並立即執行一輪更新
///
/// 排程只持有 `updater` 的 `Weak`，呼叫端 drop 掉 `updater` 後之後的觸發都不再執行
pub async fn start(
    sched: &JobScheduler,
    updater: &Arc<PriceUpdater>,
    schedule: &config::Schedule,
) -> Result<()> {
    for (scope, every) in plan(schedule) {
        let job = create_job(scope, every, Arc::downgrade(updater))?;
        sched.add(job).await?;
        logging::info_file_async(format!(
            "Scheduled price update({}) every {} minute(s)",
            scope,
            every.as_secs() / 60
        ));
    }

    sched.start().await?;

    let updater = updater.clone();
    task::spawn(async move {
        if let Err(why) = updater.execute(Scope::All).await {
            logging::error_file_async(format!(
                "Failed to execute the initial price update because {:?}",
                why
            ));
        }
    });

    logging::info_console(format!(
        "StockPriceUpdater 已啟動 Rust OS/Arch: {}/{}",
        env::consts::OS,
        env::consts::ARCH
    ));

    Ok(())
}

/// 兩個市場的間隔相同時合併成一個工作
fn plan(schedule: &config::Schedule) -> Vec<(Scope, Duration)> {
    let minutes = |m: u64| Duration::from_secs(m * 60);

    if schedule.taiwan_interval == schedule.us_interval {
        return vec![(Scope::All, minutes(schedule.taiwan_interval))];
    }

    vec![
        (
            Scope::Market(Market::Taiwan),
            minutes(schedule.taiwan_interval),
        ),
        (
            Scope::Market(Market::UnitedStates),
            minutes(schedule.us_interval),
        ),
    ]
}

fn create_job(scope: Scope, every: Duration, updater: Weak<PriceUpdater>) -> Result<Job> {
    let guard = Arc::new(Mutex::new(()));

    Ok(Job::new_repeated_async(every, move |_uuid, _l| {
        let updater = updater.clone();
        let guard = guard.clone();
        Box::pin(async move {
            tick(&updater, &guard, scope).await;
        })
    })?)
}

/// 排程觸發一次，回傳是否有執行更新
async fn tick(updater: &Weak<PriceUpdater>, guard: &Mutex<()>, scope: Scope) -> bool {
    let Some(updater) = updater.upgrade() else {
        logging::warn_file_async(format!(
            "Skip price update({}) because the updater has been closed",
            scope
        ));
        return false;
    };

    single_flight(guard, scope, || async move {
        updater.execute(scope).await.map(|_| ())
    })
    .await
}

/// 上一輪尚未結束時略過本次觸發，回傳是否有執行
async fn single_flight<F, Fut>(guard: &Mutex<()>, scope: Scope, task: F) -> bool
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let Ok(_running) = guard.try_lock() else {
        logging::warn_file_async(format!(
            "Skip price update({}) because the previous one is still running",
            scope
        ));
        return false;
    };

    if let Err(why) = task().await {
        logging::error_file_async(format!(
            "Failed to execute price update({}) because {:?}",
            scope, why
        ));
    }

    true
}
