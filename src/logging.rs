use colored::{Color, Colorize};
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Step,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Step,
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    fn tag(self) -> (&'static str, Color) {
        match self {
            LogLevel::Step => ("STEP", Color::Magenta),
            LogLevel::Info => ("INFO", Color::Cyan),
            LogLevel::Success => ("SUCCESS", Color::Green),
            LogLevel::Warning => ("WARNING", Color::Yellow),
            LogLevel::Error => ("ERROR", Color::Red),
        }
    }
}

const MIN_PADDING_AFTER_BRACKET: usize = 1;

static PREFIX_WIDTH: Lazy<usize> = Lazy::new(|| {
    LogLevel::ALL
        .iter()
        .map(|level| level.tag().0.len() + 4)
        .max()
        .unwrap_or(11)
        + MIN_PADDING_AFTER_BRACKET
});

// Indexed in `LogLevel::ALL` order.
static LOG_PREFIXES: Lazy<Vec<String>> = Lazy::new(|| {
    colored::control::set_override(true);

    LogLevel::ALL
        .iter()
        .map(|level| {
            let (label, color) = level.tag();
            let visual_width = label.len() + 4;
            let padding = PREFIX_WIDTH.saturating_sub(visual_width);
            let inner = format!(" {} ", label).color(color).bold();
            format!("[{}]{}", inner, " ".repeat(padding))
        })
        .collect()
});

pub fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_level(false)
        .with_target(false)
        .compact();

    tracing_subscriber::fmt()
        .event_format(format)
        .with_ansi(true)
        .with_env_filter(filter)
        .init();
}

pub fn log(level: LogLevel, message: &str) {
    let idx = LogLevel::ALL.iter().position(|l| *l == level).unwrap_or(0);
    let prefix = &LOG_PREFIXES[idx];

    match level {
        LogLevel::Step => tracing::info!(target: "step", "{}{}", prefix, message),
        LogLevel::Info | LogLevel::Success => tracing::info!("{}{}", prefix, message),
        LogLevel::Warning => tracing::warn!("{}{}", prefix, message),
        LogLevel::Error => tracing::error!("{}{}", prefix, message),
    }
}
