use std::{fmt::Write as _, thread};

use chrono::{format::DelayedFormat, DateTime, Local};
use once_cell::sync::Lazy;
use strum::Display;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::logging::rotate::Rotate;

pub mod rotate;

/// 累積到這個大小或 channel 已清空時才寫入檔案
const BUFFER_SIZE: usize = 4096;

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("default"));

#[derive(Display, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

pub struct LogMessage {
    pub level: Level,
    pub msg: String,
    pub created_at: DateTime<Local>,
}

impl LogMessage {
    pub fn new(level: Level, msg: String) -> Self {
        LogMessage {
            level,
            msg,
            created_at: Local::now(),
        }
    }
}

/// 具名的檔案日誌，寫入 log/%Y-%m-%d-{name}.log
pub struct Logger {
    writer: UnboundedSender<LogMessage>,
}

impl Logger {
    pub fn new(log_name: &str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();
        let pattern = format!("log/%Y-%m-%d-{}.log", log_name);

        // 寫入檔案的操作使用另一個線程處理
        let spawned = thread::Builder::new()
            .name(format!("log-{}", log_name))
            .spawn(move || {
                let mut rotate = Rotate::new(pattern);
                let mut lines = String::with_capacity(BUFFER_SIZE);

                while let Some(received) = rx.blocking_recv() {
                    if writeln!(
                        &mut lines,
                        "{} {} {}",
                        received.created_at.format("%F %X%.6f"),
                        received.level,
                        received.msg
                    )
                    .is_err()
                    {
                        continue;
                    }

                    if rx.is_empty() || lines.len() >= BUFFER_SIZE {
                        if let Err(why) = rotate.write_msg(received.created_at, lines.as_bytes()) {
                            error_console(format!(
                                "Failed to write to log file. because:{:?}\r\nmsg:{}",
                                why, lines
                            ));
                        }

                        rotate.flush();
                        lines.clear();
                    }
                }
            });

        if let Err(why) = spawned {
            error_console(format!("Failed to spawn the log writer because {:?}", why));
        }

        Logger { writer: tx }
    }

    pub fn debug(&self, log: String) {
        self.send(Level::Debug, log);
    }

    pub fn info(&self, log: String) {
        self.send(Level::Info, log);
    }

    pub fn warn(&self, log: String) {
        self.send(Level::Warn, log);
    }

    pub fn error(&self, log: String) {
        self.send(Level::Error, log);
    }

    fn send(&self, level: Level, msg: String) {
        if level >= Level::Info {
            println!("{}", console_line(level, &msg));
        }

        if let Err(why) = self.writer.send(LogMessage::new(level, msg)) {
            error_console(why.to_string());
        }
    }
}

fn console_line(level: Level, msg: &str) -> String {
    format!(
        "[{}] [{:<5}] {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level.to_string(),
        msg
    )
}

pub fn debug_file_async(log: String) {
    LOGGER.debug(log);
}

pub fn info_file_async(log: String) {
    LOGGER.info(log);
}

pub fn warn_file_async(log: String) {
    LOGGER.warn(log);
}

pub fn error_file_async(log: String) {
    LOGGER.error(log);
}

pub fn info_console(log: String) {
    println!(
        "{} Info {}",
        Local::now().format("%Y-%m-%d %H:%M:%S.%3f"),
        log
    );
}

pub fn error_console(log: String) {
    println!(
        "{} Error {}",
        DelayedFormat::to_string(&Local::now().format("%Y-%m-%d %H:%M:%S.%3f")),
        log
    );
}
