use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::table::RouteTable;
use crate::rules::RuleSet;

/// Shared handle to the live route table. Readers never block a reload.
#[derive(Clone)]
pub struct RouteManager {
    table: Arc<ArcSwap<RouteTable>>,
}

impl RouteManager {
    pub fn new(initial: RouteTable) -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(RouteTable::load(path)?))
    }

    pub fn load(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    pub fn swap(&self, new_table: RouteTable) {
        self.table.store(Arc::new(new_table));
    }

    pub fn layers_for(&self, path: &str) -> Vec<Arc<RuleSet>> {
        self.table.load().layers_for(path)
    }
}
