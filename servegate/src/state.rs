use dashmap::DashMap;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Cross-request memory consulted by the evaluator. Implementations must be
/// safe under concurrent evaluations; the evaluator never locks them.
pub trait StateTracker: Send + Sync {
    /// How many times `path` has been served so far.
    fn hits_for_path(&self, path: &str) -> Result<u64, StateError>;

    /// Whether `client` has already been served every one of `paths`.
    fn prerequisites_satisfied(&self, client: Option<IpAddr>, paths: &[String]) -> bool;
}

/// In-process tracker for a single gate process and for `servegate check`
/// dry runs. Counts reset on restart.
///
/// The per-client history keeps one entry per peer address ever served and
/// is never pruned on its own; a long-lived server either calls
/// [`MemoryState::forget_client`] once a client's chain is done or plugs in
/// a persistent [`StateTracker`].
#[derive(Debug, Default)]
pub struct MemoryState {
    hits: DashMap<String, AtomicU64>,
    visited: DashMap<IpAddr, HashSet<String>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful serve of `path` to `client`. Called by the
    /// serving layer after the response went out.
    pub fn record_hit(&self, path: &str, client: Option<IpAddr>) {
        self.hits
            .entry(path.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);

        if let Some(ip) = client {
            self.visited.entry(ip).or_default().insert(path.to_string());
        }
    }

    /// Drop the served-path history of `client`. Path hit counts stay, so
    /// serve caps keep holding.
    pub fn forget_client(&self, client: IpAddr) -> bool {
        self.visited.remove(&client).is_some()
    }

    pub fn clients(&self) -> usize {
        self.visited.len()
    }
}

impl StateTracker for MemoryState {
    fn hits_for_path(&self, path: &str) -> Result<u64, StateError> {
        Ok(self
            .hits
            .get(path)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0))
    }

    fn prerequisites_satisfied(&self, client: Option<IpAddr>, paths: &[String]) -> bool {
        let Some(ip) = client else { return false; };
        let Some(seen) = self.visited.get(&ip) else { return false; };
        paths.iter().all(|p| seen.contains(p))
    }
}
