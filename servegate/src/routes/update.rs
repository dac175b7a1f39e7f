use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;

use super::manager::RouteManager;
use super::table::RouteTable;
use crate::metrics;

/// Polls the routes file and swaps in a fresh table whenever its mtime
/// moves. A table that fails to load is logged and the old one kept.
pub struct RouteUpdater {
    mgr: RouteManager,
    routes_path: PathBuf,
    interval: Duration,
}

impl RouteUpdater {
    pub fn new(mgr: RouteManager, routes_path: PathBuf, interval: Duration) -> Self {
        Self {
            mgr,
            routes_path,
            interval,
        }
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut last_mtime: Option<SystemTime> = None;
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("route updater shutdown");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    let meta = match tokio::fs::metadata(&self.routes_path).await {
                        Ok(m) => m,
                        Err(e) => {
                            tracing::warn!("routes metadata error: {}", e);
                            continue;
                        }
                    };
                    let mtime = match meta.modified() {
                        Ok(t) => t,
                        Err(_) => continue,
                    };
                    if last_mtime.map(|x| x >= mtime).unwrap_or(false) {
                        continue;
                    }
                    let first = last_mtime.is_none();
                    last_mtime = Some(mtime);
                    if first {
                        // table was loaded at startup
                        continue;
                    }

                    self.reload();
                }
            }
        }
    }

    pub fn reload(&self) -> bool {
        match RouteTable::load(&self.routes_path) {
            Ok(table) => {
                let n = table.len();
                self.mgr.swap(table);
                metrics::counters::inc_route_reload("ok");
                tracing::info!(routes = n, "routes reloaded");
                true
            }
            Err(e) => {
                metrics::counters::inc_route_reload("error");
                tracing::error!("routes reload failed (keep old): {:#}", e);
                false
            }
        }
    }
}
