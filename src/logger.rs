use env_logger::Env;

/// Initialize the global logger using `env_logger`.
///
/// The level comes from `RUST_LOG`; `info` when unset.
pub fn init() {
    init_with_default("info");
}

/// Same as [`init`] with a caller supplied default filter, e.g. `debug` for
/// the CLI's `--verbose` flag.
pub fn init_with_default(filter: &str) {
    let env = Env::default().default_filter_or(filter);
    // Ignore errors if the logger was already initialized
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .format_module_path(false)
        .try_init();
}
