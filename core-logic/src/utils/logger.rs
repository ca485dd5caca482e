use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used by bot events; everything else is library noise.
pub const EVENT_TARGET: &str = "klok";

pub fn setup_logger() -> Option<WorkerGuard> {
    // Create logs directory
    std::fs::create_dir_all("logs").ok();

    let file_appender = tracing_appender::rolling::hourly("logs", "app");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(EVENT_TARGET, Level::INFO)
        .with_default(Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(EVENT_TARGET, Level::INFO)
        .with_default(Level::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    // Return guard - MUST be kept alive by caller
    Some(guard)
}

// --- Formatters ---

#[derive(Default)]
struct MessageVisitor {
    message: String,
    kind: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "kind" => self.kind = Some(format!("{:?}", value).trim_matches('"').to_string()),
            _ => {}
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "kind" => self.kind = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Glyph and colour for an event, from its `kind` field or, failing that,
/// its level.
fn decoration(kind: Option<&str>, level: &Level) -> (&'static str, Color) {
    match kind {
        Some("success") => ("✓", Color::Green),
        Some("custom") => ("*", Color::Magenta),
        Some("error") => ("✗", Color::Red),
        Some("warning") => ("!", Color::Yellow),
        Some("info") => ("ℹ", Color::Blue),
        _ => match *level {
            Level::ERROR => ("✗", Color::Red),
            Level::WARN => ("!", Color::Yellow),
            _ => ("ℹ", Color::Blue),
        },
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let timestamp = Local::now().format("%H:%M:%S");
        let (glyph, color) = decoration(visitor.kind.as_deref(), event.metadata().level());
        let line = format!("[{}] [{}] {}", timestamp, glyph, visitor.message);

        write!(writer, "{}", Style::new().fg(color).paint(line))?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        write!(writer, "{} [{}] ", timestamp, level)?;
        if let Some(kind) = &visitor.kind {
            write!(writer, "[{}] ", kind)?;
        }
        writeln!(writer, "{}", visitor.message)
    }
}
