//! Logging initialization and the plain-text log file.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::config::LogConfig;
use crate::error::{Error, Result, ResultExt};

/// Timestamp prefix of every log file line, e.g. `[10/19/26 14:03:11]`.
const LOG_TIME_FORMAT: &str = "[%D %T]";

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (`RUST_LOG`, falling back to `config.filter`)
/// - A console layer on stderr (unless disabled)
/// - A plain-text file layer, the file truncated at startup
///
/// # Errors
///
/// Returns an error if the filter directive is invalid, the log file can not be
/// created, or a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// let config = triangle_core::LogConfig::default();
/// triangle_core::init_logging(&config).unwrap();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            Error::Config(format!("Invalid log filter '{}': {}", config.filter, e))
        })?,
    };

    let file = create_log_file(&config.file)?;
    let console = config
        .console
        .then(|| fmt::layer().with_target(true).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer(file))
        .try_init()
        .map_err(|e| Error::Setup(format!("Can not install log subscriber: {}", e)))
}

/// Creates the log file, truncating any previous run's contents.
pub fn create_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(Error::from)
            .with_context(|| format!("Can not create log directory {}", parent.display()))?;
    }

    File::create(path)
        .map_err(Error::from)
        .with_context(|| format!("Can not open log file {}", path.display()))
}

/// Builds the file layer: no ANSI colors, local timestamp prefix.
///
/// Each event is written straight through to the file, so lines survive a crash.
pub fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{error, info};

    #[test]
    fn test_file_layer_writes_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let file = create_log_file(&path).unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(file));
        tracing::subscriber::with_default(subscriber, || {
            info!("Resizing window to {}x{}", 640, 480);
            error!("Can not create command queue");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.starts_with('['), "missing timestamp prefix: {line}");
            assert!(!line.contains('\u{1b}'), "ANSI escape in log file: {line}");
        }
        assert!(lines[0].contains("Resizing window to 640x480"));
        assert!(lines[1].contains("ERROR"));
    }

    #[test]
    fn test_log_file_truncated_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        create_log_file(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_log_file_parent_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("nested").join("log.txt");

        create_log_file(&path).unwrap();

        assert!(path.exists());
    }
}
