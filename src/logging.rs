use tracing_subscriber::{EnvFilter, fmt};

/// Inicializace tracingu. Úroveň přes `RUST_LOG`, default `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

#[macro_export]
macro_rules! log_anyhow_with_source {
    ($err:expr, $($rest:tt)+) => {{
        // Jasně řekneme, že pracujeme s anyhow::Error
        let err: &anyhow::Error = &$err;

        // Nejnižší příčina chyby (root cause)
        let root = err.root_cause();

        ::tracing::error!(
            error = %err,       // např. "cannot read network statistics from /proc/net/dev"
            root_cause = %root, // např. "No such file or directory (os error 2)"
            $($rest)+
        );
    }};
}

#[macro_export]
macro_rules! log_error_display {
    ($err:expr, $($rest:tt)+) => {{
        ::tracing::error!(
            error = %$err,
            $($rest)+
        );
    }};
}
