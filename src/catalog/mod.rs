//! Action catalog
//!
//! The action vocabulary and each action's physical bindings, loaded once from
//! a JSON document and immutable afterwards. Share it behind an `Arc`; all
//! accessors take `&self`.

pub mod types;

pub use types::{ActionDefinition, ActionId, Category, PhysicalInput, RawBinding, RawCatalog};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::prefixed_strings;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read action catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse action catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid action catalog ({} problem(s)): {}", .problems.len(), .problems.join("; "))]
    Invalid { problems: Vec<String> },

    #[error("Catalog was not loaded from a file and cannot be reloaded")]
    NoSource,
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone)]
pub struct ActionCatalog {
    game_name: String,
    game_version: Option<String>,
    config_name: Option<String>,
    source: Option<PathBuf>,
    /// Position == id.
    actions: Vec<ActionDefinition>,
    by_name: HashMap<String, ActionId>,
    by_input: HashMap<PhysicalInput, Vec<ActionId>>,
    categories: BTreeMap<String, Category>,
}

impl ActionCatalog {
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalog = Self::from_json_str(&content)?;
        catalog.source = Some(path.to_path_buf());

        tracing::info!(
            "Loaded action catalog: {} ({} actions) from {}",
            catalog.game_name,
            catalog.count(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> CatalogResult<Self> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawCatalog) -> CatalogResult<Self> {
        let mut problems = Vec::new();
        let mut actions = Vec::with_capacity(raw.actions.len());

        for (index, action) in raw.actions.into_iter().enumerate() {
            let id = match ActionId::try_from(action.id) {
                Ok(id) => id,
                Err(_) => {
                    problems.push(format!("action #{} '{}' has invalid id {}", index, action.name, action.id));
                    continue;
                }
            };

            let mut bindings = Vec::with_capacity(action.keys.len());
            for binding in &action.keys {
                match binding {
                    RawBinding::Plain(key) if !key.trim().is_empty() => bindings.push(PhysicalInput::key(key)),
                    RawBinding::Plain(_) => {
                        problems.push(format!("action '{}' has an empty key binding", action.name));
                    }
                    RawBinding::Tagged(pair) if pair.len() == 2 => {
                        match PhysicalInput::from_tagged(&pair[0], &pair[1]) {
                            Some(input) => bindings.push(input),
                            None => problems.push(format!(
                                "action '{}' uses unknown binding type '{}'",
                                action.name, pair[0]
                            )),
                        }
                    }
                    RawBinding::Tagged(pair) => problems.push(format!(
                        "action '{}' has a compound binding with {} element(s), expected [type, value]",
                        action.name,
                        pair.len()
                    )),
                }
            }

            let mut definition = ActionDefinition::new(id, &action.name, &action.category, bindings);
            definition.display_names = prefixed_strings(&action.extra, "display_name_");
            definition.gamepad = action.gamepad;
            actions.push(definition);
        }

        let categories = raw.categories.into_iter().map(|(key, category)| Category {
            names: prefixed_strings(&category.fields, "name_"),
            key,
        });

        let mut catalog = Self::build(raw.game_name, actions, categories, problems)?;
        catalog.game_version = raw.game_version;
        catalog.config_name = raw.config_name;
        Ok(catalog)
    }

    /// Builds a catalog from already-typed definitions, applying the same
    /// validation as [`ActionCatalog::load`].
    pub fn from_definitions(
        game_name: &str,
        actions: Vec<ActionDefinition>,
        categories: impl IntoIterator<Item = Category>,
    ) -> CatalogResult<Self> {
        Self::build(game_name.to_string(), actions, categories, Vec::new())
    }

    fn build(
        game_name: String,
        mut actions: Vec<ActionDefinition>,
        categories: impl IntoIterator<Item = Category>,
        mut problems: Vec<String>,
    ) -> CatalogResult<Self> {
        let categories: BTreeMap<String, Category> =
            categories.into_iter().map(|category| (category.key.clone(), category)).collect();

        problems.extend(validate(&actions, &categories));
        if !problems.is_empty() {
            return Err(CatalogError::Invalid { problems });
        }

        actions.sort_by_key(|action| action.id);

        let by_name = actions.iter().map(|action| (action.name.clone(), action.id)).collect();

        let mut by_input: HashMap<PhysicalInput, Vec<ActionId>> = HashMap::new();
        for action in &actions {
            for input in &action.bindings {
                let owners = by_input.entry(input.clone()).or_default();
                if !owners.contains(&action.id) {
                    owners.push(action.id);
                }
            }
        }

        for action in &actions {
            if !is_upper_snake(&action.name) {
                tracing::warn!(
                    "Action name should use UPPERCASE_WITH_UNDERSCORES: '{}'",
                    action.name
                );
            }
        }

        Ok(Self {
            game_name,
            game_version: None,
            config_name: None,
            source: None,
            actions,
            by_name,
            by_input,
            categories,
        })
    }

    /// Reads the same source file again and returns a fresh catalog. The
    /// current instance is left untouched.
    pub fn reload(&self) -> CatalogResult<Self> {
        let source = self.source.as_ref().ok_or(CatalogError::NoSource)?;
        Self::load(source)
    }

    pub fn lookup_by_id(&self, id: ActionId) -> Option<&ActionDefinition> {
        self.actions.get(id as usize)
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&ActionDefinition> {
        self.by_name.get(name).and_then(|id| self.lookup_by_id(*id))
    }

    pub fn bindings_of(&self, id: ActionId) -> Option<&[PhysicalInput]> {
        self.lookup_by_id(id).map(|action| action.bindings.as_slice())
    }

    /// Ids of every action bound to `input`, ascending.
    pub fn actions_for_input(&self, input: &PhysicalInput) -> &[ActionId] {
        self.by_input.get(input).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Number of actions per category key.
    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for action in &self.actions {
            *counts.entry(action.category.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    pub fn game_version(&self) -> Option<&str> {
        self.game_version.as_deref()
    }

    pub fn config_name(&self) -> Option<&str> {
        self.config_name.as_deref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Every reason the definitions can't form a catalog. Empty means valid.
fn validate(actions: &[ActionDefinition], categories: &BTreeMap<String, Category>) -> Vec<String> {
    let mut problems = Vec::new();

    if actions.is_empty() {
        problems.push("action list is empty".to_string());
        return problems;
    }

    let mut ids = BTreeSet::new();
    let mut names = BTreeSet::new();

    for action in actions {
        if !ids.insert(action.id) {
            problems.push(format!("duplicate action id {}", action.id));
        }
        if action.name.trim().is_empty() {
            problems.push(format!("action {} has an empty name", action.id));
        } else if !names.insert(action.name.as_str()) {
            problems.push(format!("duplicate action name '{}'", action.name));
        }
        if !categories.contains_key(&action.category) {
            problems.push(format!(
                "action '{}' references undeclared category '{}'",
                action.name, action.category
            ));
        }
    }

    let expected = actions.len() as ActionId;
    let missing: Vec<ActionId> = (0..expected).filter(|id| !ids.contains(id)).collect();
    if !missing.is_empty() {
        problems.push(format!("action ids are not contiguous from 0, missing {:?}", missing));
    }
    let out_of_range: Vec<ActionId> = ids.range(expected..).copied().collect();
    if !out_of_range.is_empty() {
        problems.push(format!("action ids out of range 0..{}: {:?}", expected, out_of_range));
    }

    problems
}

fn is_upper_snake(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
