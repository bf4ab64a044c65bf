use env_logger::{Builder, Target};
use log::LevelFilter;
use pingora::prelude::*;
use pingora::{OrErr, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

/// The log file for the executable at `exe`: `<exe stem>.log`, or `<exe stem>_<suffix>.log`
/// when a non-blank suffix is given, next to the executable.
pub fn default_log_path(exe: &Path, suffix: Option<&str>) -> PathBuf {
    let stem = exe
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    let file_name = match suffix.map(str::trim) {
        Some(suffix) if !suffix.is_empty() => format!("{stem}_{suffix}.log"),
        _ => format!("{stem}.log"),
    };
    exe.with_file_name(file_name)
}

/// Route all log records to `path`, appending. `RUST_LOG` overrides `level`.
pub fn init(path: &Path, level: LevelFilter) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .or_err_with(FileOpenError, || {
            format!("Unable to open log file {}", path.display())
        })?;

    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let thread = thread::current();
            writeln!(
                buf,
                "{} [{}] [{}] {}",
                buf.timestamp_millis(),
                thread.name().unwrap_or("main"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .try_init()
        .or_err(InternalError, "Unable to install logger")
}
