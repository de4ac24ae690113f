use crate::domain::model::normalize_item_name;
use crate::domain::ports::AliasResolver;
use crate::utils::error::Result;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

/// One printing from a card dump (a JSON array of these).
#[derive(Debug, Clone, Deserialize)]
pub struct CardRecord {
    pub oracle_id: String,
    pub name: String,
    #[serde(default)]
    pub printed_name: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

/// Every printed name of a card, keyed by its oracle id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAliasLibrary {
    names_by_id: HashMap<String, BTreeSet<String>>,
    id_by_name: HashMap<String, String>,
    canonical_by_id: HashMap<String, String>,
}

impl InMemoryAliasLibrary {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let records: Vec<CardRecord> = serde_json::from_reader(reader)?;
        Ok(Self::from_records(records))
    }

    pub fn from_records<I: IntoIterator<Item = CardRecord>>(records: I) -> Self {
        let mut library = Self::default();
        for record in records {
            library.add(record);
        }
        library
    }

    fn add(&mut self, record: CardRecord) {
        let english = normalize_item_name(&record.name);
        let local = record
            .printed_name
            .as_deref()
            .map(normalize_item_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| english.clone());

        let names = self.names_by_id.entry(record.oracle_id.clone()).or_default();
        for name in [english.clone(), local] {
            names.insert(name.clone());
            self.id_by_name.insert(name, record.oracle_id.clone());
        }

        let is_english = record.lang.as_deref().map_or(true, |l| l == "en");
        if is_english || !self.canonical_by_id.contains_key(&record.oracle_id) {
            self.canonical_by_id.insert(record.oracle_id, english);
        }
    }

    pub fn card_count(&self) -> usize {
        self.names_by_id.len()
    }
}

impl AliasResolver for InMemoryAliasLibrary {
    fn aliases_of(&self, item: &str) -> Option<BTreeSet<String>> {
        let id = self.id_by_name.get(&normalize_item_name(item))?;
        self.names_by_id.get(id).cloned()
    }

    fn canonical_name(&self, item: &str) -> Option<String> {
        let id = self.id_by_name.get(&normalize_item_name(item))?;
        self.canonical_by_id.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"[
        {"id": "1", "oracle_id": "o-ring", "name": "Sol Ring", "lang": "en"},
        {"id": "2", "oracle_id": "o-ring", "name": "Sol Ring", "printed_name": "Кольцо Солнца", "lang": "ru"},
        {"id": "3", "oracle_id": "o-bolt", "name": "Lightning Bolt", "printed_name": "Blitzschlag", "lang": "de"}
    ]"#;

    #[test]
    fn test_aliases_cover_every_printing() {
        let library = InMemoryAliasLibrary::from_reader(DUMP.as_bytes()).unwrap();

        let aliases = library.aliases_of("КОЛЬЦО СОЛНЦА").unwrap();
        assert!(aliases.contains("sol ring"));
        assert!(aliases.contains("кольцо солнца"));
        assert_eq!(library.card_count(), 2);
    }

    #[test]
    fn test_canonical_name_is_english() {
        let library = InMemoryAliasLibrary::from_reader(DUMP.as_bytes()).unwrap();

        assert_eq!(library.canonical_name("Кольцо Солнца").as_deref(), Some("sol ring"));
        assert_eq!(library.canonical_name("blitzschlag").as_deref(), Some("lightning bolt"));
    }

    #[test]
    fn test_unknown_name() {
        let library = InMemoryAliasLibrary::from_reader(DUMP.as_bytes()).unwrap();
        assert!(library.aliases_of("black lotus").is_none());
        assert!(library.canonical_name("black lotus").is_none());
    }
}
