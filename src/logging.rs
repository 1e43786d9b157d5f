use cfg_if::cfg_if;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};
use tracing_subscriber::util::SubscriberInitExt;

/// Viewer logs at info, GPU internals only when they warn
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

fn filter_or_default(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Route `tracing` to the browser console. Repeated calls are no-ops.
        pub fn init() {
            let wasm_layer = tracing_wasm::WASMLayer::new(
                tracing_wasm::WASMLayerConfig::default(),
            );

            let _ = tracing_subscriber::registry()
                .with(filter_or_default(None))
                .with(wasm_layer)
                .try_init();

            #[cfg(feature = "console_error_panic_hook")]
            console_error_panic_hook::set_once();
        }
    } else {
        use std::ffi::OsStr;
        use std::path::{Path, PathBuf};

        use once_cell::sync::OnceCell;
        use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
        use tracing_subscriber::fmt;

        const DEFAULT_LOG_FILE: &str = "logs/avatar-head.log";

        static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

        fn log_file_path() -> PathBuf {
            std::env::var_os("RUST_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
        }

        /// Daily-rotated writer; the guard lives until exit so buffered lines flush
        fn rolling_writer(path: &Path) -> NonBlocking {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let prefix = path.file_name().unwrap_or(OsStr::new("avatar-head.log"));
            let (writer, guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::daily(dir, prefix),
            );
            let _ = FILE_GUARD.set(guard);
            writer
        }

        fn panic_message(info: &std::panic::PanicHookInfo<'_>) -> String {
            let payload = info.payload();
            let text = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic>");
            match info.location() {
                Some(loc) => format!("panic at {}:{}:{}: {text}", loc.file(), loc.line(), loc.column()),
                None => format!("panic: {text}"),
            }
        }

        /// stderr plus `RUST_LOG_FILE` (default `logs/avatar-head.log`), filtered by `RUST_LOG`
        pub fn init() {
            let directives = std::env::var("RUST_LOG").ok();

            let console_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .compact();

            let file_layer = fmt::layer()
                .with_writer(rolling_writer(&log_file_path()))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .compact();

            let _ = tracing_subscriber::registry()
                .with(filter_or_default(directives.as_deref()))
                .with(console_layer)
                .with(file_layer)
                .try_init();

            std::panic::set_hook(Box::new(|info| {
                let bt = std::backtrace::Backtrace::force_capture();
                tracing::error!("{}\nBacktrace:\n{bt:?}", panic_message(info));
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_bad_directives_fall_back() {
        let filter = filter_or_default(Some("viewer=loudest"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));

        let filter = filter_or_default(Some("debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
