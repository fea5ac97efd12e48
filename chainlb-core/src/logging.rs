use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 可配置的日志级别
///
/// `tracing` 的宏要求编译期确定级别，这里在运行时按配置分发。
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// 以当前级别输出一条日志
    pub fn log(&self, message: impl Display) {
        match self {
            LogLevel::Off => {}
            LogLevel::Error => tracing::error!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Trace => tracing::trace!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }

        let parsed: Wrapper = toml::from_str("level = \"trace\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Trace);

        let parsed: Wrapper = toml::from_str("level = \"off\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Off);
    }
}
