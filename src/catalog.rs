use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::limits::DEFAULT_GROUP;
use crate::model::Resource;

#[derive(Debug)]
pub enum CatalogError {
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io { path, source } => {
                write!(f, "cannot read resource definitions {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io { source, .. } => Some(source),
        }
    }
}

/// Every bookable resource, keyed by id, plus a per-group listing in definition order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    resources: BTreeMap<String, Resource>,
    groups: BTreeMap<String, Vec<String>>,
}

#[derive(Default)]
struct Draft {
    id: String,
    name: String,
    group: String,
    description: String,
}

enum ParseState {
    Idle,
    Headers(Draft),
    Body(Draft),
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&text);
        if catalog.is_empty() {
            warn!("no resources defined in {}", path.display());
        } else {
            info!("loaded {} resources from {}", catalog.len(), path.display());
        }
        Ok(catalog)
    }

    /// Parse the resource definition format:
    ///
    /// ```text
    /// # comment
    /// id cluster9
    /// name Cluster Nine
    /// group Lab A
    ///
    /// free-text description
    /// .
    /// ```
    ///
    /// A record cut off inside its headers is dropped; one cut off inside its body is kept.
    pub fn parse(text: &str) -> Self {
        let mut catalog = Self::default();
        let mut state = ParseState::Idle;

        for line in text.lines() {
            state = match state {
                ParseState::Idle => {
                    if line.is_empty() || line.starts_with('#') {
                        ParseState::Idle
                    } else {
                        let mut draft = Draft::default();
                        parse_header(&mut draft, line);
                        ParseState::Headers(draft)
                    }
                }
                ParseState::Headers(mut draft) => {
                    if line.starts_with('#') {
                        ParseState::Headers(draft)
                    } else if line.is_empty() {
                        ParseState::Body(draft)
                    } else {
                        parse_header(&mut draft, line);
                        ParseState::Headers(draft)
                    }
                }
                ParseState::Body(mut draft) => {
                    if line == "." {
                        catalog.finish(draft);
                        ParseState::Idle
                    } else {
                        draft.description.push_str(line);
                        draft.description.push('\n');
                        ParseState::Body(draft)
                    }
                }
            };
        }

        match state {
            ParseState::Body(draft) => catalog.finish(draft),
            ParseState::Headers(draft) => {
                warn!("dropping resource record without body: {:?}", draft.id);
            }
            ParseState::Idle => {}
        }

        catalog
    }

    fn finish(&mut self, draft: Draft) {
        if draft.id.is_empty() {
            warn!("dropping resource record without id (name {:?})", draft.name);
            return;
        }
        let group = if draft.group.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            draft.group
        };
        let name = if draft.name.is_empty() {
            draft.id.clone()
        } else {
            draft.name
        };
        let resource = Resource {
            id: draft.id,
            name,
            description: draft.description,
            group,
        };

        // Last definition wins; pull the earlier one out of its group listing.
        if let Some(previous) = self.resources.get(&resource.id) {
            warn!("duplicate resource id {}, keeping the later definition", resource.id);
            if let Some(ids) = self.groups.get_mut(&previous.group) {
                ids.retain(|id| id != &resource.id);
                if ids.is_empty() {
                    self.groups.remove(&previous.group);
                }
            }
        }

        self.groups
            .entry(resource.group.clone())
            .or_default()
            .push(resource.id.clone());
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resource ids in catalog (lexicographic) order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Groups sorted by name, resources in definition order.
    pub fn grouped(&self) -> Vec<(&str, Vec<&Resource>)> {
        self.groups
            .iter()
            .map(|(group, ids)| {
                let members = ids.iter().filter_map(|id| self.resources.get(id)).collect();
                (group.as_str(), members)
            })
            .collect()
    }
}

fn parse_header(draft: &mut Draft, line: &str) {
    let line = line.trim_start();
    let (key, rest) = match line.split_once(char::is_whitespace) {
        Some((key, rest)) => (key, rest.trim_start()),
        None => (line, ""),
    };
    match key {
        "id" => draft.id = rest.split_whitespace().next().unwrap_or_default().to_string(),
        "name" => draft.name = rest.to_string(),
        "group" => draft.group = rest.to_string(),
        _ => {}
    }
}
