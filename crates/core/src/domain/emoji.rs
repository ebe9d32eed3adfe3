use serde::{Deserialize, Serialize};

const CUSTOM_ALIAS_PREFIX: &str = "alias:";

/// One emoji and every short name that refers to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    pub short_name: String,
    #[serde(default)]
    pub short_names: Vec<String>,
}

impl Emoji {
    pub fn new(short_name: impl Into<String>, short_names: Vec<String>) -> Self {
        Self { short_name: short_name.into(), short_names }
    }

    /// Builds an entry from a workspace custom emoji. A value of `alias:<target>`
    /// makes `name` another short name for `target`; anything else (an image URL)
    /// makes `name` canonical.
    pub fn from_custom(name: &str, value: &str) -> Self {
        match value.strip_prefix(CUSTOM_ALIAS_PREFIX) {
            Some(target) if !target.trim().is_empty() => {
                Self::new(target.trim(), vec![name.to_string()])
            }
            _ => Self::new(name, vec![name.to_string()]),
        }
    }
}
