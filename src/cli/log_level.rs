use clap::ValueEnum;

/// Verbosity of the diagnostic stream. `Silent` disables the subscriber
/// entirely; every other variant caps the emitted `tracing` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl From<LogLevel> for Option<tracing::Level> {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_warn() {
        assert_eq!(LogLevel::default(), LogLevel::Warn);
    }

    #[test]
    fn silent_maps_to_no_level() {
        assert_eq!(Option::<tracing::Level>::from(LogLevel::Silent), None);
        assert_eq!(
            Option::<tracing::Level>::from(LogLevel::Debug),
            Some(tracing::Level::DEBUG)
        );
    }
}
