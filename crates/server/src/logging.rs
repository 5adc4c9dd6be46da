//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggerSettings};

/// Resolves `logger.output_path` to a writer. Files are created if missing
/// and appended to.
///
/// # Errors
/// If the file cannot be opened.
pub fn open_writer(output_path: &str) -> io::Result<BoxMakeWriter> {
    match output_path.trim() {
        "" | "stdout" => Ok(BoxMakeWriter::new(io::stdout)),
        "stderr" => Ok(BoxMakeWriter::new(io::stderr)),
        path => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(BoxMakeWriter::new(Arc::new(file)))
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
///
/// # Errors
/// If the log file cannot be opened.
///
/// # Panics
/// If a global subscriber is already installed.
pub fn init(settings: &LoggerSettings) -> io::Result<()> {
    let writer = open_writer(&settings.output_path)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(writer),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(writer))
            .init(),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::io::Write;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[test]
    fn test_file_output_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renfound.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let writer = open_writer(path.to_str().unwrap()).unwrap();
        writer.make_writer().write_all(b"later\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn test_unopenable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("renfound.log");

        assert!(open_writer(missing.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_standard_streams() {
        assert!(open_writer("stdout").is_ok());
        assert!(open_writer("").is_ok());
        assert!(open_writer("stderr").is_ok());
    }
}
