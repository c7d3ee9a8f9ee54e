use std::path::{Path, PathBuf};

use async_trait::async_trait;
use careadvisor_core_types::KnowledgeEntry;
use serde::Deserialize;
use tracing::info;

use crate::builtin::builtin_entries;
use crate::errors::{KnowledgeError, Result};

/// Where knowledge entries come from at service start.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Vec<KnowledgeEntry>>;
}

/// Entries held in memory, the builtin seed set by default.
#[derive(Clone, Debug)]
pub struct StaticSource {
    entries: Vec<KnowledgeEntry>,
}

impl StaticSource {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(builtin_entries())
    }
}

#[async_trait]
impl KnowledgeSource for StaticSource {
    fn describe(&self) -> String {
        format!("static ({} entries)", self.entries.len())
    }

    async fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        if self.entries.is_empty() {
            return Err(KnowledgeError::Empty);
        }
        Ok(self.entries.clone())
    }
}

/// JSON or YAML file holding either a bare list of entries or `{ entries: [...] }`.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FileLayout {
    List(Vec<KnowledgeEntry>),
    Wrapped { entries: Vec<KnowledgeEntry> },
}

impl FileLayout {
    fn into_entries(self) -> Vec<KnowledgeEntry> {
        match self {
            FileLayout::List(entries) => entries,
            FileLayout::Wrapped { entries } => entries,
        }
    }
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KnowledgeSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn load(&self) -> Result<Vec<KnowledgeEntry>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| KnowledgeError::Io {
                path: self.path.clone(),
                source,
            })?;
        let entries = parse_entries(&self.path, &content)?;
        if entries.is_empty() {
            return Err(KnowledgeError::Empty);
        }
        info!(
            target: "knowledge_base",
            path = %self.path.display(),
            entries = entries.len(),
            "loaded knowledge entries"
        );
        Ok(entries)
    }
}

fn parse_entries(path: &Path, content: &str) -> Result<Vec<KnowledgeEntry>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let layout: FileLayout = match extension.as_str() {
        "json" => serde_json::from_str(content)
            .map_err(|err| KnowledgeError::Parse(format!("{}", err)))?,
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|err| KnowledgeError::Parse(format!("{}", err)))?,
        other => return Err(KnowledgeError::UnsupportedFormat(other.to_string())),
    };
    Ok(layout.into_entries())
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::EvidenceLevel;

    #[tokio::test]
    async fn loads_yaml_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.yaml");
        std::fs::write(
            &path,
            r#"- diagnosis: pneumonia
  evidenceLevel: A
  recommendations:
    - administer antibiotics per protocol
- diagnosis: pneumonia
  evidenceLevel: B
  recommendations:
    - chest physiotherapy
"#,
        )
        .unwrap();

        let entries = FileSource::new(&path).load().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].evidence_level, EvidenceLevel::A);
    }

    #[tokio::test]
    async fn loads_wrapped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"{"entries":[{"diagnosis":"asthma","evidenceLevel":"C","recommendations":["x"]}]}"#,
        )
        .unwrap();

        let entries = FileSource::new(&path).load().await.unwrap();
        assert_eq!(entries[0].diagnosis, "asthma");
    }

    #[tokio::test]
    async fn rejects_unknown_extension_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("kb.txt");
        std::fs::write(&txt, "[]").unwrap();
        assert!(matches!(
            FileSource::new(&txt).load().await,
            Err(KnowledgeError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            FileSource::new(dir.path().join("missing.json")).load().await,
            Err(KnowledgeError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn empty_sources_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(FileSource::new(&path).load().await, Err(KnowledgeError::Empty)));
        assert!(matches!(StaticSource::new(Vec::new()).load().await, Err(KnowledgeError::Empty)));
    }
}
