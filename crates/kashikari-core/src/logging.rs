use crate::Result;

/// Initialize logging/tracing for the bot.
///
/// The always-on baseline is the bracketed stdout/stderr tags written at the
/// call sites ([CMD], [ACCRUAL], ...). Structured tracing output is opt-in
/// behind the `tracing` feature; without it this is a no-op, and the public
/// API is the same either way.
pub fn init(service_name: &str) -> Result<()> {
    let _ = service_name;

    #[cfg(feature = "tracing")]
    {
        use tracing_subscriber::{fmt, EnvFilter};

        // Default: info for our crates, warn for everything else.
        // Can be overridden with `RUST_LOG`.
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "info,kashikari=info,kashikari_core=info,{service_name}=info"
            ))
        });

        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(true)
            .init();
    }

    Ok(())
}
