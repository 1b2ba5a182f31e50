//! cookie-consent demo server.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. `--audit`: print the consent audit log and exit
//!   6. Build consent state and router
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Serve until shutdown

use std::net::SocketAddr;

use axum::{Extension, Router, response::Html, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cookie_consent::bootstrap::logger;
use cookie_consent::config::{self, Config};
use cookie_consent::consent::ConsentService;
use cookie_consent::error::AppError;
use cookie_consent::http::{self, ConsentContext, ConsentState, view};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.server.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        bind = %config.server.bind,
        work_dir = %config.server.work_dir.display(),
        enabled = config.consent.enabled,
        categories = config.consent.categories.len(),
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    if args.audit {
        return print_audit_log(&config);
    }

    let state = ConsentState::in_memory(config.consent.clone())?;
    let app = http::attach(demo_pages(state.clone()), state);

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let bind = config.server.bind.clone();
    let listener = TcpListener::bind(&bind)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind}: {e}")))?;
    info!(%bind, "cookie-consent demo listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("server error: {e}")))?;

    info!("server shut down");
    Ok(())
}

/// A single page showing where the banner and the consented scripts go.
fn demo_pages(state: ConsentState) -> Router {
    Router::new().route(
        "/",
        get(move |ctx: Option<Extension<ConsentContext>>| {
            let state = state.clone();
            async move {
                let ctx = ctx.map(|Extension(c)| c);
                Html(format!(
                    "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>cookie-consent demo</title>\n{}\n</head>\n<body>\n<h1>cookie-consent demo</h1>\n{}\n</body>\n</html>\n",
                    view::render_scripts(ctx.as_ref()),
                    view::render_banner(ctx.as_ref(), &state.config),
                ))
            }
        }),
    )
}

fn print_audit_log(config: &Config) -> Result<(), AppError> {
    if !config.consent.logging.enabled {
        println!("consent logging is disabled");
        return Ok(());
    }
    let service = ConsentService::new(
        std::sync::Arc::new(config.consent.clone()),
        std::sync::Arc::new(cookie_consent::consent::MemorySessionStore::default()),
    );
    for entry in service.consent_log()? {
        let line = serde_json::to_string(&entry)
            .map_err(|e| AppError::Audit(format!("serialise entry: {e}")))?;
        println!("{line}");
    }
    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    audit: bool,
}

fn parse_cli_args() -> CliArgs {
    parse_args(std::env::args().skip(1))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut audit = false;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: cookie-consent [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("      --audit                Print the consent audit log and exit");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "--audit" => audit = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add(u8::try_from(a.len() - 1).unwrap_or(u8::MAX));
            }
            other => eprintln!("warning: ignoring unknown argument '{other}'"),
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path, audit }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> CliArgs {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(args(&[]).log_level, None);
        assert_eq!(args(&["-v"]).log_level, Some("warn"));
        assert_eq!(args(&["-v", "--verbose"]).log_level, Some("info"));
        assert_eq!(args(&["-vvv"]).log_level, Some("debug"));
    }

    #[test]
    fn long_verbosity_flag_saturates() {
        let flag = format!("-{}", "v".repeat(256));
        assert_eq!(args(&[flag.as_str()]).log_level, Some("trace"));
    }

    #[test]
    fn config_and_audit_flags() {
        let parsed = args(&["--audit", "-f", "custom.toml"]);
        assert!(parsed.audit);
        assert_eq!(parsed.config_path.as_deref(), Some("custom.toml"));
    }
}
