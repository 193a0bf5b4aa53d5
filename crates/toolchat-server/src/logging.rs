use env_logger::{Builder, Env};

/// Honours `RUST_LOG` when set; otherwise `info`, or `debug` with `--debug`.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
