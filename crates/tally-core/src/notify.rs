use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

/// How long a banner stays up unless dismissed or replaced.
pub const BANNER_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "success",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message)
    }
}

/// Sink for status messages and busy indicators.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);

    /// `Some(label)` while an operation runs, `None` once it is over.
    fn busy(&self, _label: Option<&str>) {}
}

/// Marks the notifier busy for as long as the guard lives.
pub struct BusyGuard {
    notifier: Arc<dyn Notifier>,
}

impl BusyGuard {
    pub fn start(notifier: Arc<dyn Notifier>, label: &str) -> Self {
        notifier.busy(Some(label));
        Self { notifier }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.notifier.busy(None);
    }
}

/// Single-slot status banner: a newer notice replaces the older one.
#[derive(Debug, Default)]
pub struct Banner {
    current: Option<(Notice, Instant)>,
}

impl Banner {
    pub fn show(&mut self, notice: Notice, now: Instant) {
        self.current = Some((notice, now));
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }

    pub fn visible(&self, now: Instant) -> Option<&Notice> {
        let (notice, shown_at) = self.current.as_ref()?;
        (now.saturating_duration_since(*shown_at) < BANNER_TTL).then_some(notice)
    }
}

/// Keeps the latest notice around for redraws and, unless built with
/// `banner_only`, also echoes every notice to stderr as it arrives.
#[derive(Debug)]
pub struct ConsoleNotifier {
    color: bool,
    echo: bool,
    banner: Mutex<Banner>,
}

impl ConsoleNotifier {
    pub fn new(color: bool) -> Self {
        Self {
            color: color && io::stderr().is_terminal(),
            echo: true,
            banner: Mutex::new(Banner::default()),
        }
    }

    pub fn banner_only(color: bool) -> Self {
        Self {
            echo: false,
            ..Self::new(color)
        }
    }

    pub fn live_banner(&self) -> Option<Notice> {
        self.banner.lock().visible(Instant::now()).cloned()
    }

    pub fn dismiss(&self) {
        self.banner.lock().dismiss();
    }

    pub fn format(&self, notice: &Notice) -> String {
        let tag = format!("[{}]", notice.level);
        if !self.color {
            return format!("{tag} {}", notice.message);
        }
        let code = match notice.level {
            Level::Info => "36",
            Level::Warning => "33",
            Level::Error => "31",
            Level::Success => "32",
        };
        format!("\x1b[{code}m{tag}\x1b[0m {}", notice.message)
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.level {
            Level::Error => error!(message = %notice.message, "notice"),
            Level::Warning => warn!(message = %notice.message, "notice"),
            Level::Info | Level::Success => info!(message = %notice.message, "notice"),
        }

        if self.echo {
            let line = self.format(notice);
            let _ = writeln!(io::stderr().lock(), "{line}");
        }
        self.banner.lock().show(notice.clone(), Instant::now());
    }

    fn busy(&self, label: Option<&str>) {
        if let Some(label) = label {
            let _ = writeln!(io::stderr().lock(), "... {label}");
        }
    }
}

/// Keeps every notice and busy transition; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
    busy: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.notices
            .lock()
            .iter()
            .filter(|notice| notice.level == level)
            .count()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    pub fn busy_transitions(&self) -> Vec<Option<String>> {
        self.busy.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }

    fn busy(&self, label: Option<&str>) {
        self.busy.lock().push(label.map(str::to_string));
    }
}
