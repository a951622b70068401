use std::fs::create_dir_all;
use std::path::PathBuf;

use backtrace::Backtrace;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// `~/.cmdtree`, created on demand.
pub fn cmdtree_dir() -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(".cmdtree");
    create_dir_all(&dir).ok()?;
    Some(dir)
}

/// `~/.cmdtree/log/<name>.log`.
pub fn log_file_path(name: &str) -> Option<PathBuf> {
    let log_dir = cmdtree_dir()?.join("log");
    create_dir_all(&log_dir).ok()?;
    Some(log_dir.join(&format!("{}.log", name)))
}

/// Installs a file logger and a panic hook which logs a backtrace. Meant for
/// binaries; the library itself only emits records through `log`.
pub fn install_logger(name: &str) -> Result<(), failure::Error> {
    let path = match log_file_path(name) {
        Some(path) => path,
        None => bail!("failed to locate the home directory"),
    };

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Blue)
        .debug(Color::Green)
        .trace(Color::BrightBlack);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}] {}",
                colors.color(record.level()),
                record.file().unwrap_or_else(|| record.target()),
                record.line().unwrap_or(0),
                message
            ))
        })
        .level(if cfg!(debug_assertions) {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        })
        .chain(fern::log_file(path)?)
        .apply()
        .map_err(|err| format_err!("failed to install the logger: {}", err))?;

    std::panic::set_hook(Box::new(|info| {
        error!("{}", info);
        prettify_backtrace(&Backtrace::new());
    }));

    Ok(())
}

/// Logs the frames of `backtrace` which belong to the caller's code.
pub fn prettify_backtrace(backtrace: &Backtrace) {
    for (i, frame) in backtrace.frames().iter().enumerate() {
        for symbol in frame.symbols() {
            if let Some(path) = symbol.filename() {
                let filename = path.to_str().unwrap_or("(non-utf8 path)");
                if filename.contains("/.rustup/")
                    || filename.contains("/.cargo/")
                    || filename.starts_with("/rustc/")
                {
                    continue;
                }

                error!(
                    "    #{} {}:{}, col {}",
                    i,
                    filename,
                    symbol.lineno().unwrap_or(0),
                    symbol.colno().unwrap_or(0),
                );
            }
        }
    }
}
