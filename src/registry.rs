use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct OperationDescriptor {
    name: String,
}

/// The set of operation kinds the coordinator recognizes, loaded once at
/// startup by scanning a directory of small descriptor files. The
/// coordinator only ever needs `name`; computing the operation on two
/// integers is a worker's job.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    names: Arc<HashSet<String>>,
}

impl OperationRegistry {
    /// Scans `dir` for `*.toml` descriptor files, each declaring a `name`.
    /// Loading is one-shot; there is no hot reload.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut names = HashSet::new();

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading operations directory {}", dir.display()))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading operation descriptor {}", path.display()))?;
            let descriptor: OperationDescriptor = toml::from_str(&raw)
                .with_context(|| format!("parsing operation descriptor {}", path.display()))?;
            names.insert(descriptor.name);
        }

        Ok(Self {
            names: Arc::new(names),
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_descriptors_and_ignores_other_files() {
        let dir = tempdir();
        write_descriptor(&dir, "sum.toml", "name = \"sum\"\n");
        write_descriptor(&dir, "multiply.toml", "name = \"multiply\"\n");
        write_descriptor(&dir, "README.md", "not a descriptor");

        let registry = OperationRegistry::load_from_dir(&dir).unwrap();

        assert!(registry.contains("sum"));
        assert!(registry.contains("multiply"));
        assert!(!registry.contains("divide"));
        assert_eq!(registry.names(), vec!["multiply".to_string(), "sum".to_string()]);
    }

    fn tempdir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("coordinator-registry-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_descriptor(dir: &std::path::Path, name: &str, contents: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }
}
