use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RosterError;
use super::record::name_key;

pub const MAX_MY_CHARACTERS: usize = 3;

/// Persisted roster preferences (`roster.json`).
///
/// Whatever mutation runs, the main character stays in `characters` with
/// visibility `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RosterConfig {
    pub main_character: Option<String>,
    /// Known characters and whether they are shown.
    pub characters: BTreeMap<String, bool>,
    /// The user's own characters, in preference order.
    pub my_characters: Vec<String>,
    pub manual_characters: Vec<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub last_app_run: Option<DateTime<Utc>>,
}

impl RosterConfig {
    pub fn is_main(&self, name: &str) -> bool {
        self.main_character
            .as_deref()
            .is_some_and(|main| name_key(main) == name_key(name))
    }

    pub fn ensure_main_visible(&mut self) {
        let Some(main) = self.main_character.clone() else {
            return;
        };
        let key = self.character_key(&main).unwrap_or(main);
        self.characters.insert(key, true);
    }

    /// Existing spelling of `name` in `characters`, if any.
    fn character_key(&self, name: &str) -> Option<String> {
        let wanted = name_key(name);
        self.characters
            .keys()
            .find(|k| name_key(k) == wanted)
            .cloned()
    }

    pub fn knows(&self, name: &str) -> bool {
        self.character_key(name).is_some()
    }

    /// Returns true if the character was not known yet.
    pub fn track(&mut self, name: &str) -> bool {
        if self.character_key(name).is_some() {
            return false;
        }
        self.characters.insert(name.to_string(), true);
        true
    }

    /// Returns true if the main character changed.
    pub fn set_main(&mut self, name: &str) -> Result<bool, RosterError> {
        let name = validated(name)?;
        if self.is_main(name) {
            self.ensure_main_visible();
            return Ok(false);
        }
        self.main_character = Some(name.to_string());
        self.track(name);
        self.ensure_main_visible();
        Ok(true)
    }

    pub fn set_visibility(&mut self, name: &str, visible: bool) -> Result<(), RosterError> {
        let name = validated(name)?;
        if !visible && self.is_main(name) {
            return Err(RosterError::MainCharacterProtected);
        }
        let key = self.character_key(name).unwrap_or_else(|| name.to_string());
        self.characters.insert(key, visible);
        self.ensure_main_visible();
        Ok(())
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.character_key(name)
            .and_then(|k| self.characters.get(&k).copied())
            .unwrap_or(true)
    }

    /// Returns true if the character was added.
    pub fn add_manual(&mut self, name: &str) -> Result<bool, RosterError> {
        let name = validated(name)?;
        self.track(name);
        self.ensure_main_visible();
        if contains(&self.manual_characters, name) {
            return Ok(false);
        }
        self.manual_characters.push(name.to_string());
        Ok(true)
    }

    /// Returns true if anything was removed.
    pub fn remove_character(&mut self, name: &str) -> Result<bool, RosterError> {
        let name = validated(name)?;
        if self.is_main(name) {
            return Err(RosterError::MainCharacterProtected);
        }
        let mut removed = false;
        if let Some(key) = self.character_key(name) {
            self.characters.remove(&key);
            removed = true;
        }
        removed |= remove_from(&mut self.manual_characters, name);
        removed |= remove_from(&mut self.my_characters, name);
        self.ensure_main_visible();
        Ok(removed)
    }

    pub fn add_my_character(&mut self, name: &str) -> Result<bool, RosterError> {
        let name = validated(name)?;
        if contains(&self.my_characters, name) {
            return Ok(false);
        }
        if self.my_characters.len() >= MAX_MY_CHARACTERS {
            return Err(RosterError::MyCharactersFull(MAX_MY_CHARACTERS));
        }
        self.my_characters.push(name.to_string());
        self.track(name);
        self.ensure_main_visible();
        Ok(true)
    }

    pub fn remove_my_character(&mut self, name: &str) -> bool {
        remove_from(&mut self.my_characters, name)
    }

    pub fn is_manual(&self, name: &str) -> bool {
        contains(&self.manual_characters, name)
    }

    /// Forget detected characters. The main character and manual entries stay.
    pub fn clear_detected_characters(&mut self) {
        let keep: Vec<String> = self
            .characters
            .keys()
            .filter(|k| self.is_main(k) || self.is_manual(k))
            .cloned()
            .collect();
        self.characters.retain(|k, _| keep.contains(k));
        self.ensure_main_visible();
    }
}

fn validated(name: &str) -> Result<&str, RosterError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RosterError::EmptyName);
    }
    Ok(name)
}

fn contains(list: &[String], name: &str) -> bool {
    let key = name_key(name);
    list.iter().any(|n| name_key(n) == key)
}

fn remove_from(list: &mut Vec<String>, name: &str) -> bool {
    let key = name_key(name);
    let before = list.len();
    list.retain(|n| name_key(n) != key);
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_character_always_visible() {
        let mut config = RosterConfig::default();
        config.set_main("Moana").unwrap();
        config.set_visibility("Bob", false).unwrap();

        assert_eq!(
            config.set_visibility("moana", false),
            Err(RosterError::MainCharacterProtected)
        );
        assert_eq!(
            config.remove_character("MOANA"),
            Err(RosterError::MainCharacterProtected)
        );
        config.characters.insert("Moana".to_string(), false);
        config.set_visibility("Bob", true).unwrap();

        assert!(config.is_visible("Moana"));
        assert!(config.is_visible("Bob"));
    }

    #[test]
    fn test_visibility_sequence_keeps_main() {
        let mut config = RosterConfig::default();
        config.set_main("Main").unwrap();
        let ops: [(&str, bool); 6] = [
            ("Alt", false),
            ("Main", true),
            ("Main", false),
            ("Alt", true),
            ("Other", false),
            ("main", false),
        ];
        for (name, visible) in ops {
            let _ = config.set_visibility(name, visible);
            assert!(config.is_visible("Main"));
        }
        assert_eq!(config.characters.len(), 3);
    }

    #[test]
    fn test_manual_operations_are_idempotent() {
        let mut config = RosterConfig::default();
        assert!(config.add_manual("Zed").unwrap());
        assert!(!config.add_manual("zed").unwrap());
        assert_eq!(config.manual_characters, vec!["Zed"]);

        assert!(config.set_main("Ana").unwrap());
        assert!(!config.set_main("Ana").unwrap());

        assert!(config.remove_character("Zed").unwrap());
        assert!(!config.remove_character("Zed").unwrap());
        assert_eq!(config.set_main("  "), Err(RosterError::EmptyName));
    }

    #[test]
    fn test_my_characters_capped() {
        let mut config = RosterConfig::default();
        for name in ["A", "B", "C"] {
            assert!(config.add_my_character(name).unwrap());
        }
        assert!(!config.add_my_character("a").unwrap());
        assert_eq!(
            config.add_my_character("D"),
            Err(RosterError::MyCharactersFull(MAX_MY_CHARACTERS))
        );
        assert!(config.remove_my_character("B"));
        assert!(config.add_my_character("D").unwrap());
        assert_eq!(config.my_characters, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_clear_detected_keeps_main_and_manual() {
        let mut config = RosterConfig::default();
        config.set_main("Main").unwrap();
        config.add_manual("Hand").unwrap();
        config.track("Seen");
        config.clear_detected_characters();
        assert_eq!(
            config.characters.keys().cloned().collect::<Vec<_>>(),
            vec!["Hand", "Main"]
        );
    }

    #[test]
    fn test_camel_case_document() {
        let json = r#"{"mainCharacter":"Ana","characters":{"Ana":false},"myCharacters":["Ana"],"lastAppRun":"2026-03-01T12:00:00Z"}"#;
        let mut config: RosterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.main_character.as_deref(), Some("Ana"));
        assert!(config.last_app_run.is_some());
        config.ensure_main_visible();
        assert_eq!(config.characters.get("Ana"), Some(&true));
    }
}
