use memescan_logs::{LogLevel, MemescanLogger};
use once_cell::sync::Lazy;

static LOGGER: Lazy<MemescanLogger> = Lazy::new(|| {
    let endpoint = std::env::var("MEMESCAN_LOGS_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:9200/logs/_doc".to_string());
    MemescanLogger::new(endpoint)
});

pub async fn log_error(message: &str) {
    let _ = LOGGER.log(LogLevel::Error, message, "memescan-monitor").await;
}

pub async fn log_warn(message: &str) {
    let _ = LOGGER.log(LogLevel::Warn, message, "memescan-monitor").await;
}

pub async fn log_info(message: &str) {
    let _ = LOGGER.log(LogLevel::Info, message, "memescan-monitor").await;
}

pub async fn log_debug(message: &str) {
    let _ = LOGGER.log(LogLevel::Debug, message, "memescan-monitor").await;
}
