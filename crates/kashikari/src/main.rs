use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use kashikari_core::{config::Config, ledger::Ledger, utils::AuditLogger};

#[tokio::main]
async fn main() -> Result<(), kashikari_core::Error> {
    kashikari_core::logging::init("kashikari")?;

    let cfg = Arc::new(Config::load()?);
    let ledger = Arc::new(Ledger::new());
    let audit = Arc::new(AuditLogger::new(
        cfg.audit_log_path.clone(),
        cfg.audit_log_json,
    ));

    let shutdown = CancellationToken::new();

    // Liveness probe, fully decoupled from ledger state.
    let health = {
        let addr = cfg.health_addr;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = kashikari_health::serve(addr, shutdown).await {
                eprintln!("[HEALTH] Server failed: {e}");
            }
        })
    };

    let polling = {
        let cfg = cfg.clone();
        let ledger = ledger.clone();
        let audit = audit.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            kashikari_telegram::router::run_polling(cfg, ledger, audit, shutdown).await
        })
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("Shutting down");
        }
        res = polling => {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("Telegram bot failed: {e}"),
                Err(e) => eprintln!("Telegram task panicked: {e}"),
            }
        }
    }

    shutdown.cancel();
    let _ = health.await;

    Ok(())
}
