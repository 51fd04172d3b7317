use std::fs::OpenOptions;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

use crate::CliError;
use crate::settings::{LogFormat, LoggingSettings};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. JSON output goes to the
/// configured file when there is one, stderr otherwise.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|err| CliError::Logging(format!("invalid log level: {err}")))?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match settings.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => {
            let writer = match &settings.file {
                Some(path) => {
                    let file = OpenOptions::new().create(true).append(true).open(path)?;
                    let file = Arc::new(Mutex::new(file));
                    BoxMakeWriter::new(move || SharedWriter {
                        file: Arc::clone(&file),
                    })
                }
                None => BoxMakeWriter::new(io::stderr),
            };
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_timer(UtcTime::rfc_3339())
                        .with_writer(writer),
                )
                .try_init()
        }
    };

    installed.map_err(|err| CliError::Logging(err.to_string()))
}

struct SharedWriter {
    file: Arc<Mutex<std::fs::File>>,
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("failed to lock log file"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("failed to lock log file"))?;
        file.flush()
    }
}
