//! Startup loading of mock definitions from a mappings directory.

use crate::definition::MockDefinition;
use crate::store::MockStore;
use anyhow::Context;
use std::path::Path;
use tracing::{info, warn};

/// Load every `*.json` file in `dir` into the store.
///
/// Files are loaded in name order so dispatch priority is deterministic.
/// A file that fails to parse or validate is logged and skipped; it never
/// aborts loading of the remaining files. Returns the number of definitions
/// loaded.
pub fn load_dir(store: &MockStore, dir: &Path) -> anyhow::Result<usize> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("read mappings directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut loaded = 0;
    for path in paths {
        match load_file(&path) {
            Ok(def) => {
                let key = store.insert(def);
                info!(file = %path.display(), key = %key, "Loaded mock definition");
                loaded += 1;
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "Skipping mock file");
            }
        }
    }

    Ok(loaded)
}

fn load_file(path: &Path) -> anyhow::Result<MockDefinition> {
    let content = std::fs::read_to_string(path)?;
    let def: MockDefinition = serde_json::from_str(&content)?;
    def.validate()?;
    Ok(def)
}
