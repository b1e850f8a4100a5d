//! Logging setup
//!
//! Two sinks share one `tracing` registry:
//! - the console, filtered by the `-v`/`-q` verbosity flags
//! - one file per site (`<log-dir>/<site>.log`), fed by [`SiteLogLayer`]
//!
//! A site run executes inside a span named `site` carrying a `site` field.
//! Every event emitted inside that span, including from worker tasks
//! instrumented with it, is appended to that site's file as
//! `timestamp - site - LEVEL - message`.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::Path;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, time::FormatTime};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Name of the span wrapping a site run, and of its field
pub const SITE_FIELD: &str = "site";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Keeps the non-blocking file writers alive; drop it to flush them
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Console timestamps in the same format as the site files
struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}

/// Console filter for the given verbosity flags
pub fn console_filter(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("part_sweep=info,warn"),
            1 => EnvFilter::new("part_sweep=debug,info"),
            2 => EnvFilter::new("part_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    }
}

/// Installs the global subscriber
///
/// # Arguments
///
/// * `verbose` - Number of `-v` flags
/// * `quiet` - Only errors on the console
/// * `log_dir` - Directory receiving the per-site files, created if missing
/// * `site_names` - Sites that get a file sink
pub fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_dir: &Path,
    site_names: &[String],
) -> io::Result<LogGuards> {
    let (site_layer, guards) = SiteLogLayer::new(log_dir, site_names)?;
    let file_level = if verbose > 0 {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let console_layer = fmt::layer()
        .with_timer(LocalTimestamp)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(console_filter(verbose, quiet));

    Registry::default()
        .with(console_layer)
        .with(site_layer.with_filter(file_level))
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(guards)
}

/// Site name stored in the extensions of a `site` span
#[derive(Debug, Clone)]
struct SiteTag(String);

/// Layer routing events of a site span to that site's log file
pub struct SiteLogLayer {
    sinks: HashMap<String, NonBlocking>,
}

impl SiteLogLayer {
    /// Opens (appending) one log file per site under `log_dir`
    pub fn new(log_dir: &Path, site_names: &[String]) -> io::Result<(Self, LogGuards)> {
        std::fs::create_dir_all(log_dir)?;

        let mut sinks = HashMap::new();
        let mut guards = Vec::new();
        for name in site_names {
            if sinks.contains_key(name) {
                continue;
            }
            let appender = rolling::never(log_dir, format!("{}.log", name));
            let (writer, guard) = non_blocking(appender);
            sinks.insert(name.clone(), writer);
            guards.push(guard);
        }

        Ok((Self { sinks }, LogGuards { _guards: guards }))
    }
}

impl<S> Layer<S> for SiteLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SiteVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(site), Some(span)) = (visitor.site, ctx.span(id)) {
            span.extensions_mut().insert(SiteTag(site));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(scope) = ctx.event_scope(event) else {
            return;
        };
        let Some(site) = scope.into_iter().find_map(|span| {
            let extensions = span.extensions();
            extensions.get::<SiteTag>().map(|tag| tag.0.clone())
        }) else {
            return;
        };
        let Some(sink) = self.sinks.get(&site) else {
            return;
        };

        let mut message = MessageVisitor::default();
        event.record(&mut message);
        let line = format_line(
            Local::now(),
            &site,
            event.metadata().level(),
            &message.finish(),
        );

        let mut writer = sink.clone();
        if let Err(e) = writer.write_all(line.as_bytes()) {
            eprintln!("failed to write log line for {}: {}", site, e);
        }
    }
}

/// Formats one site log line, newline included
pub fn format_line(at: DateTime<Local>, site: &str, level: &Level, message: &str) -> String {
    format!(
        "{} - {} - {} - {}\n",
        at.format(TIMESTAMP_FORMAT),
        site,
        level,
        message
    )
}

#[derive(Default)]
struct SiteVisitor {
    site: Option<String>,
}

impl Visit for SiteVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == SITE_FIELD {
            self.site = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == SITE_FIELD {
            self.site = Some(format!("{:?}", value));
        }
    }
}

/// Collects the message of an event plus any extra fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    extra: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.extra.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.extra.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.extra)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.extra, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.extra, " {}={:?}", field.name(), value);
        }
    }
}
