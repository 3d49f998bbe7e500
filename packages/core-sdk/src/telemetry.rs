use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use once_cell::sync::Lazy;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Debug, Clone)]
struct Settings {
    enabled: bool,
    log_dir: PathBuf,
}

static TELEMETRY: Lazy<std::sync::RwLock<Settings>> = Lazy::new(|| {
    std::sync::RwLock::new(Settings {
        enabled: false,
        log_dir: PathBuf::from("logs"),
    })
});

/**
 * \brief 按启动配置初始化事件日志。
 */
pub fn init(enabled: bool, log_dir: impl Into<PathBuf>) {
    if let Ok(mut guard) = TELEMETRY.write() {
        guard.enabled = enabled;
        guard.log_dir = log_dir.into();
    }
}

/**
 * \brief 查询当前遥测开关状态。
 */
pub fn is_enabled() -> bool {
    TELEMETRY.read().map(|g| g.enabled).unwrap_or(false)
}

/**
 * \brief 记录常规事件。
 */
pub fn log_event(category: &str, message: &str) {
    record("INFO", category, message);
}

/**
 * \brief 记录错误事件。
 */
pub fn log_error(category: &str, message: &str) {
    record("ERROR", category, message);
}

fn record(level: &str, category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    let log_dir = match TELEMETRY.read() {
        Ok(guard) => guard.log_dir.clone(),
        Err(_) => return,
    };
    if let Err(err) = write_line(&log_dir, level, category, message) {
        eprintln!("telemetry write failed: {}", err);
    }
}

fn write_line(log_dir: &Path, level: &str, category: &str, message: &str) -> Result<()> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("goalcraft.log"))?;
    writeln!(file, "{}", format_line(&timestamp, level, category, message))?;
    Ok(())
}

fn format_line(timestamp: &str, level: &str, category: &str, message: &str) -> String {
    // 单行记录，换行会破坏按行解析
    let flat = message.replace(['\r', '\n'], " ");
    format!("{} [{}] {} - {}", timestamp, level, category, flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_flattens_newlines() {
        let line = format_line(
            "2025-01-01T00:00:00Z",
            "ERROR",
            "server.paraphrase",
            "request failed: 500\n{\"error\":\"boom\"}",
        );
        assert_eq!(
            line,
            "2025-01-01T00:00:00Z [ERROR] server.paraphrase - request failed: 500 {\"error\":\"boom\"}"
        );
    }

    #[test]
    fn test_write_line_appends() {
        let dir = std::env::temp_dir().join(format!("goalcraft-telemetry-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        write_line(&dir, "INFO", "test", "first").expect("write first");
        write_line(&dir, "INFO", "test", "second").expect("write second");
        let content = std::fs::read_to_string(dir.join("goalcraft.log")).expect("read log");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] test - first"));
        assert!(lines[1].ends_with("[INFO] test - second"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("goalcraft-disabled-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        init(false, dir.clone());
        assert!(!is_enabled());
        log_event("test", "dropped");
        log_error("test", "dropped");
        assert!(!dir.exists());
    }
}
