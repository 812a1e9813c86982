use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;

/// Initializes the global logger.
///
/// Should be called once at the very beginning of a driver program's
/// `main` function. Log level is controlled by the `RUST_LOG` environment
/// variable and defaults to `info`.
///
/// Driver programs that want a log file in addition to the console can use
/// [`init_with_file`].
pub fn init() {
    apply(base_dispatch().chain(console_dispatch()));
}

/// Initializes the global logger with an additional plain-text log file.
pub fn init_with_file(log_file_path: &str) {
    let file_config = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(match fern::log_file(log_file_path) {
            Ok(file) => Dispatch::new().chain(file),
            Err(e) => {
                eprintln!("Failed to open log file '{}': {}", log_file_path, e);
                Dispatch::new()
            }
        });

    apply(base_dispatch().chain(console_dispatch()).chain(file_config));
}

fn base_dispatch() -> Dispatch {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_level_filter = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    Dispatch::new().level(log_level_filter)
}

fn console_dispatch() -> Dispatch {
    Dispatch::new()
        .format(|out, message, record| {
            let colors = fern::colors::ColoredLevelConfig::new()
                .error(fern::colors::Color::Red)
                .warn(fern::colors::Color::Yellow)
                .info(fern::colors::Color::Green)
                .debug(fern::colors::Color::Blue)
                .trace(fern::colors::Color::BrightBlack);

            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr())
}

fn apply(dispatch: Dispatch) {
    // A second apply (e.g. from several tests) is not an error worth failing over.
    if let Err(e) = dispatch.apply() {
        eprintln!("Failed to apply logger configuration: {}", e);
    }
}
