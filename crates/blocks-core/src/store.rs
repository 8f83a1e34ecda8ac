use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{Document, Editor};
use crate::error::StoreError;

pub const ARTICLE_SCHEMA: &str = "manos-blocks";
pub const ARTICLE_VERSION: u32 = 1;

/// A titled document as it is persisted. Files without a header load as the
/// current schema and version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default = "Article::current_schema")]
    pub schema: String,
    #[serde(default = "Article::current_version")]
    pub version: u32,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "blocks")]
    pub document: Document,
}

impl Article {
    fn current_schema() -> String {
        ARTICLE_SCHEMA.to_string()
    }

    fn current_version() -> u32 {
        ARTICLE_VERSION
    }

    pub fn new(title: impl Into<String>, document: Document) -> Self {
        Self {
            schema: Self::current_schema(),
            version: ARTICLE_VERSION,
            title: title.into(),
            document,
        }
    }

    /// Snapshot of what the editor currently shows.
    pub fn from_editor(title: impl Into<String>, editor: &Editor) -> Self {
        Self::new(title, editor.doc().clone())
    }

    /// Opens the article in a fresh editor; loading normalizes the tree.
    pub fn into_editor(self) -> Editor {
        Editor::new(self.document, None)
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// False for another schema or for a version newer than this build writes.
    pub fn is_supported(&self) -> bool {
        self.schema == ARTICLE_SCHEMA && self.version <= ARTICLE_VERSION
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Where articles live between sessions.
pub trait DocumentStore {
    fn load(&self, id: &str) -> Result<Article, StoreError>;
    fn save(&self, id: &str, article: &Article) -> Result<(), StoreError>;
    /// Ids of every stored article, sorted.
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// One `<id>.json` file per article in a directory created on first use.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })
    }

    fn file_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }
}

impl DocumentStore for JsonDirStore {
    fn load(&self, id: &str) -> Result<Article, StoreError> {
        let path = self.file_for(id)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let article =
            Article::from_json_str(&content).map_err(|source| StoreError::Malformed {
                id: id.to_string(),
                source,
            })?;
        if !article.is_supported() {
            return Err(StoreError::Unsupported {
                id: id.to_string(),
                schema: article.schema,
                version: article.version,
            });
        }
        Ok(article)
    }

    fn save(&self, id: &str, article: &Article) -> Result<(), StoreError> {
        let path = self.file_for(id)?;
        self.ensure_root()?;
        let json = article
            .to_json_pretty()
            .map_err(|source| StoreError::Malformed {
                id: id.to_string(),
                source,
            })?;
        fs::write(&path, json).map_err(|source| StoreError::Io { path, source })?;
        tracing::debug!(id, "saved article");
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        self.ensure_root()?;
        let entries = fs::read_dir(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
