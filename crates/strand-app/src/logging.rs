use crate::config::AppConfig;

/// Installs `env_logger`. `RUST_LOG` wins over the configured filter.
/// Calling it again is harmless.
pub fn init(config: &AppConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_filter.as_str());
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already installed");
    }
}
