//! File logging with size-based trimming
//!
//! Events go to `{data_dir}/nuclearcast.log`. Once the file passes
//! `max_bytes` it is cut back to its newest `keep_bytes`, both when a process
//! starts and while a long-running one (the retrain loop) keeps writing.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{AppError, AppResult};

const LOG_FILE: &str = "nuclearcast.log";

/// `logging` section of `config.yaml`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRotation {
    pub max_bytes: u64,
    /// Newest bytes kept after a trim; must be below `max_bytes`
    pub keep_bytes: u64,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            keep_bytes: 1024 * 1024,
        }
    }
}

impl LogRotation {
    pub fn validate(&self) -> AppResult<()> {
        if self.keep_bytes >= self.max_bytes {
            return Err(AppError::InvalidArgument(format!(
                "logging keep_bytes ({}) must be below max_bytes ({})",
                self.keep_bytes, self.max_bytes
            )));
        }
        Ok(())
    }
}

/// Rewrite `path` with only its newest `keep_bytes`, starting at a whole line.
///
/// Returns the new file length.
fn trim_log(path: &Path, keep_bytes: u64) -> io::Result<u64> {
    let mut source = BufReader::new(File::open(path)?);
    let len = source.get_ref().metadata()?.len();

    if len > keep_bytes {
        source.seek(SeekFrom::Start(len - keep_bytes))?;
        let mut partial = Vec::new();
        source.read_until(b'\n', &mut partial)?;
    }

    let temp_path = path.with_extension("log.tmp");
    {
        let mut out = BufWriter::new(File::create(&temp_path)?);
        writeln!(out, "# log trimmed from {len} bytes")?;
        io::copy(&mut source, &mut out)?;
        out.flush()?;
    }
    fs::rename(&temp_path, path)?;

    Ok(fs::metadata(path)?.len())
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append-only log file that trims itself as it grows
struct RotatingFile {
    path: PathBuf,
    file: File,
    len: u64,
    rotation: LogRotation,
}

impl RotatingFile {
    fn open(path: &Path, rotation: LogRotation) -> io::Result<Self> {
        let mut len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        if len > rotation.max_bytes {
            match trim_log(path, rotation.keep_bytes) {
                Ok(trimmed) => len = trimmed,
                Err(e) => eprintln!("Warning: failed to trim {}: {e}", path.display()),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: open_append(path)?,
            len,
            rotation,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.len = trim_log(&self.path, self.rotation.keep_bytes)?;
        self.file = open_append(&self.path)?;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.write(buf)?;
        self.len += written as u64;

        if self.len > self.rotation.max_bytes
            && let Err(e) = self.rotate()
        {
            eprintln!("Warning: failed to trim {}: {e}", self.path.display());
            // Keep logging; try again after another max_bytes
            self.len = 0;
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Initialize logging to `{data_dir}/nuclearcast.log`.
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(
    data_dir: &Path,
    level: &str,
    rotation: LogRotation,
) -> color_eyre::Result<PathBuf> {
    fs::create_dir_all(data_dir)?;

    let log_path = data_dir.join(LOG_FILE);
    let writer = Mutex::new(RotatingFile::open(&log_path, rotation)?);

    let default_filter = format!("nuclearcast={level},nuclearcast_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true),
        )
        .try_init()?;

    tracing::info!(
        log_path = %log_path.display(),
        max_bytes = rotation.max_bytes,
        "logging initialized"
    );
    Ok(log_path)
}
