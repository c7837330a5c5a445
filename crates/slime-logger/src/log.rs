use crate::severity::LogSeverity;
use crate::systime::now;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU8, Ordering};

/// Environment variable holding the minimum severity that gets printed.
pub const LOG_LEVEL_ENV: &str = "SLIME_LOG";

static MIN_SEVERITY: Lazy<AtomicU8> = Lazy::new(|| {
    let severity = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| value.parse::<LogSeverity>().ok())
        .unwrap_or(LogSeverity::Info);
    AtomicU8::new(severity as u8)
});

pub fn min_severity() -> LogSeverity {
    LogSeverity::from_u8(MIN_SEVERITY.load(Ordering::Relaxed))
}

pub fn set_min_severity(severity: LogSeverity) {
    MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
}

pub fn enabled(severity: LogSeverity) -> bool {
    severity >= min_severity()
}

// Logs go to stderr.
pub fn log(msg: String, log_severity: LogSeverity) {
    if enabled(log_severity) {
        eprintln!("[{}] {} {}", log_severity, now(), msg);
    }
}
