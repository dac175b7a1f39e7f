use anyhow::Context;
use clap::{Parser, Subcommand};
use http::{HeaderName, HeaderValue, Method};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use servegate::config::AppConfig;
use servegate::exec::TokioProcessRunner;
use servegate::geoip::NoGeoIp;
use servegate::routes::{RouteManager, RouteUpdater};
use servegate::state::MemoryState;
use servegate::{telemetry, Gatekeeper, RequestView};

#[derive(Debug, Parser)]
#[command(name = "servegate", version, about = "Route access rules: validate, dry-run and watch")]
struct Args {
    /// Path to config.yaml (relative paths inside config will be resolved based on this file's directory)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Load and validate the routes file.
    Validate,

    /// Evaluate one synthetic request against the routes.
    Check {
        #[arg(long)]
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Peer address as host:port.
        #[arg(long, default_value = "127.0.0.1:0")]
        remote: String,
        #[arg(long)]
        user_agent: Option<String>,
        /// Extra header as `Name: value`. Repeatable.
        #[arg(long = "header")]
        headers: Vec<String>,
        /// Raw JA3 fingerprint string.
        #[arg(long, default_value = "")]
        ja3: String,
        /// Print the decision as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Watch the routes file and reload it on change until Ctrl-C.
    Watch,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let cfg = AppConfig::from_file(&args.config)?;

    telemetry::init_tracing("servegate", &cfg.log_dir_path())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    match args.cmd {
        Cmd::Validate => validate(&cfg.routes_path)?,
        Cmd::Check { path, method, remote, user_agent, headers, ja3, json } => {
            let req = build_request(&path, &method, &remote, user_agent.as_deref(), &headers, &ja3)?;
            // non-zero on deny so scripts can branch on the verdict
            if !rt.block_on(check(&cfg, req, json))? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Cmd::Watch => rt.block_on(watch(&cfg))?,
    }
    Ok(ExitCode::SUCCESS)
}

fn validate(routes_path: &Path) -> anyhow::Result<()> {
    let mgr = RouteManager::load_from_file(routes_path)?;
    println!("{}: {} route(s) ok", routes_path.display(), mgr.load().len());
    Ok(())
}

fn build_request(
    path: &str,
    method: &str,
    remote: &str,
    user_agent: Option<&str>,
    headers: &[String],
    ja3: &str,
) -> anyhow::Result<RequestView> {
    let method = Method::from_bytes(method.as_bytes()).with_context(|| format!("bad method {method}"))?;
    let mut req = RequestView::new(method, path, remote).with_ja3(ja3);

    if let Some(ua) = user_agent {
        req = req.with_header(http::header::USER_AGENT, HeaderValue::from_bytes(ua.as_bytes())?);
    }
    for h in headers {
        let (name, value) = h
            .split_once(':')
            .with_context(|| format!("header {h:?} is not `Name: value`"))?;
        req = req.with_header(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_bytes(value.trim().as_bytes())?,
        );
    }
    Ok(req)
}

/// Prints the decision and returns whether the request would be served.
async fn check(cfg: &AppConfig, req: RequestView, json: bool) -> anyhow::Result<bool> {
    let routes = RouteManager::load_from_file(&cfg.routes_path)?;
    let gate = Gatekeeper::new(
        routes,
        Arc::new(MemoryState::new()),
        Arc::new(NoGeoIp),
        Arc::new(TokioProcessRunner::with_timeout(cfg.exec_timeout())),
    );

    let decision = gate.decide(&req).await;

    if json {
        let line = serde_json::json!({
            "path": req.path(),
            "decision": decision.kind_str(),
            "check": decision.check().map(|c| c.as_str()),
            "reason": decision.reason(),
        });
        println!("{line}");
    } else if decision.is_allow() {
        println!("ALLOW");
    } else {
        let check = decision.check().map(|c| c.as_str()).unwrap_or("");
        println!("DENY [{}] {}: {}", decision.kind_str(), check, decision.reason());
    }

    Ok(decision.is_allow())
}

async fn watch(cfg: &AppConfig) -> anyhow::Result<()> {
    let mgr = RouteManager::load_from_file(&cfg.routes_path)?;
    tracing::info!(routes = mgr.load().len(), path = %cfg.routes_path.display(), "routes loaded");

    let updater = RouteUpdater::new(mgr, cfg.routes_path.clone(), cfg.hot_reload_interval());
    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(async move { updater.run(rx).await });

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    let _ = tx.send(true);
    task.await?;
    Ok(())
}
