//! logger.rs
//! Logger del job (env_logger). Cada ejecución deja una línea por etapa y por
//! intento de envío; eso es lo que revisa el monitoreo.

/// Sin RUST_LOG: el job en `info` y las dependencias (sqlx, lettre, reqwest)
/// solo en `warn`.
const DEFAULT_FILTER: &str = "warn,feedback_report_job=info";

pub fn init_logger() {
    let log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_env))
        .format_timestamp_secs()
        .init();
}
