//! Screener catalog and category index.
//!
//! Both are loaded once at start-up from YAML (the embedded `screeners.yaml`
//! unless an override file is configured) and never mutated afterwards.

use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use tracing::{info, warn};

const BUILT_IN_CATALOG: &str = include_str!("../screeners.yaml");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("screener '{0}' is defined more than once")]
    DuplicateScreener(String),
    #[error("category '{0}' is defined more than once")]
    DuplicateCategory(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerDefinition {
    pub id: String,
    pub display_name: String,
    pub query_string: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDefinition {
    pub label: String,
    pub member_ids: Vec<String>,
}

#[derive(Deserialize)]
struct CatalogFile {
    screeners: Vec<ScreenerEntry>,
    #[serde(default)]
    categories: Vec<CategoryEntry>,
}

#[derive(Deserialize)]
struct ScreenerEntry {
    id: String,
    name: String,
    scan_clause: String,
}

#[derive(Deserialize)]
struct CategoryEntry {
    label: String,
    members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ScreenerCatalog {
    screeners: IndexMap<String, ScreenerDefinition>,
    categories: IndexMap<String, CategoryDefinition>,
}

impl ScreenerCatalog {
    pub fn built_in() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILT_IN_CATALOG)
    }

    /// Uses `path` when given, the embedded catalog otherwise.
    pub fn load(path: Option<&str>) -> Result<Arc<Self>, CatalogError> {
        let catalog = match path {
            Some(path) => {
                info!(path, "Loading screener catalog from file");
                let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
                    path: path.to_string(),
                    source,
                })?;
                Self::from_yaml_str(&content)?
            }
            None => Self::built_in()?,
        };

        info!(
            screeners = catalog.screeners.len(),
            categories = catalog.categories.len(),
            "Screener catalog loaded"
        );
        Ok(Arc::new(catalog))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;

        let mut screeners = IndexMap::with_capacity(file.screeners.len());
        for entry in file.screeners {
            if screeners.contains_key(&entry.id) {
                return Err(CatalogError::DuplicateScreener(entry.id));
            }
            screeners.insert(
                entry.id.clone(),
                ScreenerDefinition {
                    id: entry.id,
                    display_name: entry.name,
                    query_string: entry.scan_clause,
                },
            );
        }

        let mut categories = IndexMap::with_capacity(file.categories.len());
        for entry in file.categories {
            if categories.contains_key(&entry.label) {
                return Err(CatalogError::DuplicateCategory(entry.label));
            }
            for member in entry.members.iter().filter(|id| !screeners.contains_key(*id)) {
                warn!(category = %entry.label, screener = %member, "Category references unknown screener; it will be skipped");
            }
            categories.insert(
                entry.label.clone(),
                CategoryDefinition {
                    label: entry.label,
                    member_ids: entry.members,
                },
            );
        }

        Ok(Self {
            screeners,
            categories,
        })
    }

    pub fn get_definition(&self, id: &str) -> Option<&ScreenerDefinition> {
        self.screeners.get(id)
    }

    /// Members of `label` in declared order, or the whole catalog when the
    /// label is missing or unknown. Unresolvable members are skipped.
    pub fn list_by_category(&self, label: Option<&str>) -> Vec<&ScreenerDefinition> {
        match label.and_then(|l| self.categories.get(l)) {
            Some(category) => category
                .member_ids
                .iter()
                .filter_map(|id| self.screeners.get(id))
                .collect(),
            None => self.screeners.values().collect(),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.categories.values()
    }

    pub fn category_labels(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.screeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screeners.is_empty()
    }
}
