use std::{fs::OpenOptions, io, path::Path, sync::Mutex};

use tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Where log lines go, and whether they carry ANSI colours.
///
/// Without a log file, or when it cannot be opened, logs go to stderr so
/// stdout stays free for the console.
fn log_writer(log_file: Option<&Path>) -> (BoxMakeWriter, bool) {
    let Some(path) = log_file else {
        return (BoxMakeWriter::new(io::stderr), true);
    };
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        Err(err) => {
            eprintln!("failed to open log file {}: {err}", path.display());
            (BoxMakeWriter::new(io::stderr), true)
        }
    }
}

/// Installs the global subscriber.
pub fn init_logging(log_file: Option<&Path>) {
    let (writer, ansi) = log_writer(log_file);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(ansi)
        .with_writer(writer)
        .init();
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[test]
    fn log_file_is_appended_without_colour() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.log");
        std::fs::write(&path, "earlier\n").unwrap();

        let (writer, ansi) = log_writer(Some(&path));
        writer.make_writer().write_all(b"poll failed\n").unwrap();

        assert!(!ansi);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier\npoll failed\n");
    }

    #[test]
    fn unopenable_log_file_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let (_, ansi) = log_writer(Some(&dir.path().join("missing").join("client.log")));
        assert!(ansi);
    }
}
