mod calc;
mod config;
mod db;
mod directory;
mod guard;
mod http;
mod ipc;
mod logging;
mod model;
mod records;
mod session;

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

fn run_stdio(state: &ipc::AppState) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}

fn main() -> anyhow::Result<()> {
    let config = config::Config::parse();
    logging::init(&config.log_level, config.log_mode).context("init logging")?;

    let store = db::open_store(&config.db, config.memory);
    directory::seed_admin(store.as_ref(), &config.admin_password).context("seed admin user")?;

    let state = Arc::new(ipc::AppState {
        store,
        sessions: session::SessionStore::new(config.session_ttl()),
    });

    if config.stdio {
        info!(backend = state.store().backend().as_str(), "serving stdio");
        run_stdio(&state);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    runtime
        .block_on(http::serve(state, config.bind))
        .with_context(|| format!("serve http on {}", config.bind))
}
