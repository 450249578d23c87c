use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;

use crate::logging;

/// 預設單檔最大大小：10 MB
const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// 預設保留天數：7 天
const DEFAULT_MAX_AGE_DAYS: u64 = 7;

/// 依日期與大小輪轉的日誌檔
///
/// 檔名由 `chrono` 的格式字串決定，日期變更時換新檔；
/// 單檔超過 `max_size` 時遞增 generation（`name.1.log`、`name.2.log`…），不覆蓋舊檔。
pub struct Rotate {
    /// 檔名模式，例如 "log/%Y-%m-%d-default.log"
    pattern: String,
    /// 依日期產生的基礎檔名（不含 generation）
    base_fn: String,
    generation: u32,
    max_size: u64,
    current_size: u64,
    max_age: Duration,
    out: Option<BufWriter<File>>,
}

impl Rotate {
    pub fn new(pattern: String) -> Self {
        Self::with_options(pattern, DEFAULT_MAX_SIZE, DEFAULT_MAX_AGE_DAYS)
    }

    pub fn with_options(pattern: String, max_size: u64, max_age_days: u64) -> Self {
        Rotate {
            pattern,
            base_fn: String::new(),
            generation: 0,
            max_size,
            current_size: 0,
            max_age: Duration::from_secs(max_age_days * 24 * 60 * 60),
            out: None,
        }
    }

    /// 寫入日誌訊息，自動處理日期變更與大小輪轉
    pub fn write_msg(&mut self, now: DateTime<Local>, msg: &[u8]) -> Result<()> {
        let base_fn = now.format(&self.pattern).to_string();
        if base_fn != self.base_fn || self.out.is_none() {
            self.base_fn = base_fn;
            self.generation = 0;
            self.open()?;
            self.cleanup_expired();
        }

        if self.current_size > 0 && self.current_size + msg.len() as u64 > self.max_size {
            self.flush();
            self.generation += 1;
            self.open()?;
        }

        let out = self
            .out
            .as_mut()
            .ok_or_else(|| anyhow!("log file {} is not open", self.base_fn))?;
        out.write_all(msg)?;
        self.current_size += msg.len() as u64;

        Ok(())
    }

    pub fn flush(&mut self) {
        if let Some(out) = self.out.as_mut() {
            if let Err(why) = out.flush() {
                logging::error_console(format!("Failed to flush log file. because:{:?}", why));
            }
        }
    }

    /// 含 generation 的完整檔名
    ///
    /// generation = 0: "log/2025-02-03-app.log"
    /// generation = 2: "log/2025-02-03-app.2.log"
    fn file_name(base_fn: &str, generation: u32) -> PathBuf {
        let path = Path::new(base_fn);
        if generation == 0 {
            return path.to_path_buf();
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("log");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("log");
        path.with_file_name(format!("{}.{}.{}", stem, generation, ext))
    }

    fn open(&mut self) -> Result<()> {
        self.flush();

        // 同一天重啟時接續既有的最後一個世代
        while self.generation < u32::MAX
            && Self::file_name(&self.base_fn, self.generation + 1).exists()
        {
            self.generation += 1;
        }

        let file_name = Self::file_name(&self.base_fn, self.generation);
        if let Some(parent) = file_name.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_name)?;

        self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.out = Some(BufWriter::with_capacity(4096, file));

        Ok(())
    }

    /// 刪除同目錄下超過保留天數的 .log 檔
    fn cleanup_expired(&self) {
        let dir = match Path::new(&self.base_fn).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let expired = match Self::expired_files(&dir, self.max_age) {
            Ok(files) => files,
            Err(why) => {
                logging::error_console(format!(
                    "Failed to list the log directory {} because {:?}",
                    dir.display(),
                    why
                ));
                return;
            }
        };

        expired
            .par_iter()
            .with_min_len(num_cpus::get())
            .for_each(|file| {
                if let Err(why) = fs::remove_file(file) {
                    logging::error_console(format!(
                        "couldn't remove the file({}). because {:?}",
                        file.display(),
                        why
                    ));
                }
            });
    }

    fn expired_files(dir: &Path, max_age: Duration) -> io::Result<Vec<PathBuf>> {
        let now = SystemTime::now();
        let mut files = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }

            let expired = fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);

            if expired {
                files.push(path);
            }
        }

        Ok(files)
    }
}

impl Drop for Rotate {
    fn drop(&mut self) {
        self.flush();
    }
}
