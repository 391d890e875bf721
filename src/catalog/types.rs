use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Index of an action in the catalog. Valid ids form `0..count`.
pub type ActionId = u32;

/// Canonical modifier names and the aliases recorders emit for them.
const MODIFIER_ALIASES: &[(&str, &str)] = &[
    ("shift", "shift"),
    ("shift_l", "shift"),
    ("shift_r", "shift"),
    ("ctrl", "ctrl"),
    ("ctrl_l", "ctrl"),
    ("ctrl_r", "ctrl"),
    ("control", "ctrl"),
    ("control_l", "ctrl"),
    ("control_r", "ctrl"),
    ("alt", "alt"),
    ("alt_l", "alt"),
    ("alt_r", "alt"),
    ("alt_gr", "alt"),
    ("option", "alt"),
];

fn canonical_modifier(name: &str) -> Option<&'static str> {
    MODIFIER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
}

/// A single physical input the player (or the injector) can hold down.
///
/// Names are normalised on construction so that the recorder's spelling
/// (`"E"`, `"shift_l"`) and the catalog's spelling (`"e"`, `["shift", "shift"]`)
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PhysicalInput {
    Key(String),
    MouseButton(String),
    Modifier(String),
}

impl PhysicalInput {
    /// Keyboard key by name. Modifier names fold into [`PhysicalInput::Modifier`].
    pub fn key(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        match canonical_modifier(&name) {
            Some(modifier) => PhysicalInput::Modifier(modifier.to_string()),
            None => PhysicalInput::Key(name),
        }
    }

    pub fn mouse(button: &str) -> Self {
        PhysicalInput::MouseButton(button.trim().to_lowercase())
    }

    /// Modifier by name or alias; `None` if the name is not a modifier.
    pub fn modifier(name: &str) -> Option<Self> {
        canonical_modifier(&name.trim().to_lowercase())
            .map(|modifier| PhysicalInput::Modifier(modifier.to_string()))
    }

    /// Builds an input from the catalog's `[type, value]` binding form.
    ///
    /// `keyboard` and `mouse` take their value as the key/button name. A
    /// modifier tag (`shift`, `ctrl`, `control`, `alt`) names the modifier
    /// itself. Returns `None` for unrecognised tags.
    pub fn from_tagged(tag: &str, value: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "keyboard" | "key" => Some(Self::key(value)),
            "mouse" => Some(Self::mouse(value)),
            other => Self::modifier(other),
        }
    }

    pub fn is_mouse(&self) -> bool {
        matches!(self, PhysicalInput::MouseButton(_))
    }

    /// The bare name without the variant tag.
    pub fn name(&self) -> &str {
        match self {
            PhysicalInput::Key(name) | PhysicalInput::MouseButton(name) | PhysicalInput::Modifier(name) => name,
        }
    }
}

impl fmt::Display for PhysicalInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalInput::Key(name) => write!(f, "key:{}", name),
            PhysicalInput::MouseButton(name) => write!(f, "mouse:{}", name),
            PhysicalInput::Modifier(name) => write!(f, "modifier:{}", name),
        }
    }
}

/// One entry of the action vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub id: ActionId,
    pub name: String,
    pub category: String,
    /// Pressed in this order, released in this order.
    pub bindings: Vec<PhysicalInput>,
    /// `display_name_<lang>` fields keyed by `<lang>`.
    pub display_names: BTreeMap<String, String>,
    pub gamepad: Option<String>,
}

impl ActionDefinition {
    pub fn new(id: ActionId, name: &str, category: &str, bindings: Vec<PhysicalInput>) -> Self {
        Self {
            id,
            name: name.to_string(),
            category: category.to_string(),
            bindings,
            display_names: BTreeMap::new(),
            gamepad: None,
        }
    }

    pub fn display_name(&self, lang: &str) -> Option<&str> {
        self.display_names.get(lang).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub key: String,
    /// `name_<lang>` fields keyed by `<lang>`.
    pub names: BTreeMap<String, String>,
}

impl Category {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            names: BTreeMap::new(),
        }
    }
}

/// On-disk catalog document.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCatalog {
    pub game_name: String,
    #[serde(default)]
    pub game_version: Option<String>,
    #[serde(default)]
    pub config_name: Option<String>,
    pub actions: Vec<RawAction>,
    #[serde(default)]
    pub categories: BTreeMap<String, RawCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAction {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub keys: Vec<RawBinding>,
    #[serde(default)]
    pub gamepad: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// `"w"` or `["mouse", "left"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBinding {
    Plain(String),
    Tagged(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCategory {
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// Collects `<prefix><lang>` string fields into a map keyed by `<lang>`.
pub(crate) fn prefixed_strings(
    fields: &BTreeMap<String, serde_json::Value>,
    prefix: &str,
) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|(key, value)| {
            let lang = key.strip_prefix(prefix)?;
            Some((lang.to_string(), value.as_str()?.to_string()))
        })
        .collect()
}
