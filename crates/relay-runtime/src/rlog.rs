//! Leveled, context-tagged logging, ported from the teacher's kernel-style
//! `kprint` macros.
//!
//! # Environment variables
//!
//! - `RELAY_LOG_LEVEL` — `off|error|warn|info|debug|trace` or `0`-`5`.
//! - `RELAY_LOG_TIME` — `1`/`true`/`yes`/`on` to prefix a nanosecond
//!   timestamp.
//!
//! # Output format
//!
//! `[LEVEL] [<ns>] [circ<id>|svc<nick>] message`, the timestamp field
//! present only when `RELAY_LOG_TIME` is set. Context is set per-thread via
//! [`set_circuit_id`]/[`set_service`] and cleared via [`clear_context`].

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Instant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static TIME_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    START_TIME.get_or_init(Instant::now);
    TIME_ENABLED.store(env_get_bool("RELAY_LOG_TIME", false), Ordering::Relaxed);

    if let Ok(val) = std::env::var("RELAY_LOG_LEVEL") {
        let level = match val.to_lowercase().as_str() {
            "off" | "0" => LogLevel::Off,
            "error" | "1" => LogLevel::Error,
            "warn" | "2" => LogLevel::Warn,
            "info" | "3" => LogLevel::Info,
            "debug" | "4" => LogLevel::Debug,
            "trace" | "5" => LogLevel::Trace,
            _ => LogLevel::Info,
        };
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
pub fn time_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    TIME_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level as u8 <= log_level() as u8
}

#[inline]
pub fn elapsed_ns() -> u64 {
    let start = START_TIME.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

thread_local! {
    static CIRCUIT_ID: std::cell::Cell<Option<u64>> = const { std::cell::Cell::new(None) };
    static SERVICE_NICK: std::cell::RefCell<Option<String>> = const { std::cell::RefCell::new(None) };
}

/// Tag subsequent log calls on this thread with a circuit id.
pub fn set_circuit_id(id: u64) {
    CIRCUIT_ID.with(|c| c.set(Some(id)));
}

/// Tag subsequent log calls on this thread with a service nickname.
pub fn set_service(nickname: &str) {
    SERVICE_NICK.with(|s| *s.borrow_mut() = Some(nickname.to_string()));
}

/// Clear this thread's logging context.
pub fn clear_context() {
    CIRCUIT_ID.with(|c| c.set(None));
    SERVICE_NICK.with(|s| *s.borrow_mut() = None);
}

fn format_context() -> String {
    let circ = CIRCUIT_ID.with(|c| c.get());
    let svc = SERVICE_NICK.with(|s| s.borrow().clone());
    match (circ, svc) {
        (Some(c), Some(s)) => format!("[circ{c}:svc{s}]"),
        (Some(c), None) => format!("[circ{c}]"),
        (None, Some(s)) => format!("[svc{s}]"),
        (None, None) => "[--]".to_string(),
    }
}

#[doc(hidden)]
pub fn _rlog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    use std::io::Write;
    if !level_enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = write!(handle, "{} ", level.prefix());
    if time_enabled() {
        let _ = write!(handle, "[{}] ", elapsed_ns());
    }
    let _ = write!(handle, "{} ", format_context());
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
}

#[macro_export]
macro_rules! rerror {
    ($($arg:tt)*) => {{
        $crate::rlog::_rlog_impl($crate::rlog::LogLevel::Error, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! rwarn {
    ($($arg:tt)*) => {{
        $crate::rlog::_rlog_impl($crate::rlog::LogLevel::Warn, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! rinfo {
    ($($arg:tt)*) => {{
        $crate::rlog::_rlog_impl($crate::rlog::LogLevel::Info, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! rdebug {
    ($($arg:tt)*) => {{
        $crate::rlog::_rlog_impl($crate::rlog::LogLevel::Debug, format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! rtrace {
    ($($arg:tt)*) => {{
        $crate::rlog::_rlog_impl($crate::rlog::LogLevel::Trace, format_args!($($arg)*));
    }};
}
