use std::collections::HashMap;

use crate::domain::emoji::Emoji;
use crate::errors::ReactionError;

/// Canonical emoji names and the reverse alias index built from them.
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    emojis: Vec<Emoji>,
    positions: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

/// Strips the `:name:` wrapping users type and folds case.
pub fn normalize_alias(raw: &str) -> String {
    raw.trim().trim_matches(':').trim().to_ascii_lowercase()
}

impl AliasTable {
    pub fn from_sources<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = Vec<Emoji>>,
    {
        let mut table = Self::default();
        for source in sources {
            for emoji in source {
                table.merge(emoji);
            }
        }
        table
    }

    /// Adds an entry, unioning short names with any entry already holding the
    /// same canonical name. The first canonical name to claim an alias keeps it,
    /// and entries whose name is already an alias fold into the owning emoji.
    pub fn merge(&mut self, emoji: Emoji) {
        let name = normalize_alias(&emoji.short_name);
        if name.is_empty() {
            return;
        }
        let canonical = self.aliases.get(&name).cloned().unwrap_or(name);

        let position = match self.positions.get(&canonical) {
            Some(position) => *position,
            None => {
                self.emojis.push(Emoji::new(canonical.clone(), vec![canonical.clone()]));
                self.positions.insert(canonical.clone(), self.emojis.len() - 1);
                self.emojis.len() - 1
            }
        };

        let names = &mut self.emojis[position].short_names;
        for alias in emoji.short_names.iter().map(|name| normalize_alias(name)) {
            if !alias.is_empty() && !names.contains(&alias) {
                names.push(alias);
            }
        }

        for alias in names.iter() {
            self.aliases.entry(alias.clone()).or_insert_with(|| canonical.clone());
        }
        self.aliases.entry(canonical.clone()).or_insert(canonical);
    }

    pub fn resolve_canonical(&self, alias: &str) -> Result<String, ReactionError> {
        let normalized = normalize_alias(alias);
        if self.emojis.is_empty() {
            return Err(ReactionError::UnknownAlias {
                alias: normalized,
                detail: "emoji data not loaded".to_string(),
            });
        }

        self.aliases.get(&normalized).cloned().ok_or(ReactionError::UnknownAlias {
            alias: normalized,
            detail: "could not find emoji".to_string(),
        })
    }

    pub fn get(&self, canonical: &str) -> Option<&Emoji> {
        self.positions.get(canonical).and_then(|position| self.emojis.get(*position))
    }

    pub fn len(&self) -> usize {
        self.emojis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emojis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_alias, AliasTable};
    use crate::domain::emoji::Emoji;
    use crate::errors::ReactionError;

    fn emoji(short_name: &str, short_names: &[&str]) -> Emoji {
        Emoji::new(short_name, short_names.iter().map(|name| name.to_string()).collect())
    }

    #[test]
    fn resolves_aliases_to_canonical_name() {
        let table = AliasTable::from_sources([vec![
            emoji("+1", &["+1", "thumbsup"]),
            emoji("smile", &["smile"]),
        ]]);

        assert_eq!(table.resolve_canonical("thumbsup").ok(), Some("+1".to_string()));
        assert_eq!(table.resolve_canonical(":+1:").ok(), Some("+1".to_string()));
        assert_eq!(table.resolve_canonical(" :Smile: ").ok(), Some("smile".to_string()));
    }

    #[test]
    fn merges_custom_aliases_into_existing_entries() {
        let table = AliasTable::from_sources([
            vec![emoji("+1", &["+1", "thumbsup"])],
            vec![Emoji::from_custom("yes", "alias:thumbsup"), Emoji::from_custom("yes2", "alias:+1")],
        ]);

        assert_eq!(table.resolve_canonical("yes2").ok(), Some("+1".to_string()));
        assert_eq!(table.resolve_canonical("yes").ok(), Some("+1".to_string()));
        assert_eq!(table.len(), 1);

        let merged = table.get("+1").map(|entry| entry.short_names.clone()).unwrap_or_default();
        assert_eq!(
            merged,
            vec!["+1".to_string(), "thumbsup".to_string(), "yes".to_string(), "yes2".to_string()]
        );
    }

    #[test]
    fn merge_keeps_short_names_unique() {
        let table = AliasTable::from_sources([
            vec![emoji("wave", &["wave"])],
            vec![emoji("wave", &["wave", "hello"])],
        ]);

        assert_eq!(table.len(), 1);
        let names = table.get("wave").map(|entry| entry.short_names.clone()).unwrap_or_default();
        assert_eq!(names, vec!["wave".to_string(), "hello".to_string()]);
    }

    #[test]
    fn empty_table_reports_not_loaded() {
        let error = AliasTable::default().resolve_canonical("wave").expect_err("not loaded");
        assert!(matches!(error, ReactionError::UnknownAlias { ref detail, .. } if detail.contains("not loaded")));
    }

    #[test]
    fn unknown_alias_is_an_error() {
        let table = AliasTable::from_sources([vec![emoji("wave", &["wave"])]]);
        let error = table.resolve_canonical("nope").expect_err("unknown");
        assert!(matches!(error, ReactionError::UnknownAlias { ref alias, .. } if alias == "nope"));
    }

    #[test]
    fn normalize_strips_colons_and_case() {
        assert_eq!(normalize_alias(" :Tada: "), "tada");
        assert_eq!(normalize_alias("tada"), "tada");
    }
}
