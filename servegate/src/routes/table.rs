use anyhow::Context;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::rules::{RuleSet, RuleSpec};

/// On-disk form: route path -> rule layer.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RoutesFile {
    #[serde(default)]
    pub routes: BTreeMap<String, RuleSpec>,
}

/// Rule layers keyed by normalized route path.
#[derive(Debug, Default)]
pub struct RouteTable {
    layers: HashMap<String, Arc<RuleSet>>,
}

impl RouteTable {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let file: RoutesFile = serde_yaml::from_str(text).context("parse routes yaml")?;
        Self::from_file(file)
    }

    pub fn from_file(file: RoutesFile) -> anyhow::Result<Self> {
        let mut layers = HashMap::with_capacity(file.routes.len());
        for (route, spec) in file.routes {
            let key = normalize_route(&route);
            let rules = RuleSet::compile(spec).with_context(|| format!("route {route}"))?;
            if layers.insert(key.clone(), Arc::new(rules)).is_some() {
                anyhow::bail!("route {route} collides with another entry for {key}");
            }
        }
        Ok(Self { layers })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read routes file: {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("load routes file: {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers applying to `path`: the root, each ancestor directory, then
    /// the path itself, least specific first.
    pub fn layers_for(&self, path: &str) -> Vec<Arc<RuleSet>> {
        let path = normalize_route(path);
        let mut out = Vec::new();

        if let Some(l) = self.layers.get("/") {
            out.push(l.clone());
        }
        for (i, _) in path.match_indices('/').skip(1) {
            if let Some(l) = self.layers.get(&path[..i]) {
                out.push(l.clone());
            }
        }
        if path != "/" {
            if let Some(l) = self.layers.get(&path) {
                out.push(l.clone());
            }
        }
        out
    }
}

/// Leading slash, no repeated or trailing slashes.
pub fn normalize_route(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for seg in raw.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() {
        "/".to_string()
    } else {
        out
    }
}
