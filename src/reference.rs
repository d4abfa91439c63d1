// 🏷️ Reference Data - valid executive and route selections
// Static lists the header dropdowns are populated from. Each list carries a
// non-selectable placeholder sentinel that must be rejected at submit time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// REFERENCE LIST
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceList {
    /// Sentinel shown before the user picks anything ("Select ...")
    pub placeholder: String,

    /// Valid selections, placeholder excluded
    pub entries: Vec<String>,
}

impl ReferenceList {
    pub fn new(placeholder: &str, entries: Vec<String>) -> Self {
        ReferenceList {
            placeholder: placeholder.to_string(),
            entries,
        }
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        value == self.placeholder || value.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.iter().any(|e| e == value)
    }

    /// Non-placeholder AND present in the list
    pub fn is_valid_selection(&self, value: &str) -> bool {
        !self.is_placeholder(value) && self.contains(value)
    }

    /// Placeholder followed by the entries, for rendering a dropdown
    pub fn options(&self) -> Vec<&str> {
        std::iter::once(self.placeholder.as_str())
            .chain(self.entries.iter().map(String::as_str))
            .collect()
    }
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceData {
    pub executives: ReferenceList,
    pub routes: ReferenceList,
}

impl ReferenceData {
    /// Load executive/route lists from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference data from {:?}", path))?;
        let data: ReferenceData =
            serde_json::from_str(&contents).context("Failed to parse reference data JSON")?;
        Ok(data)
    }

    /// The deployment's built-in lists
    pub fn builtin() -> Self {
        ReferenceData {
            executives: ReferenceList::new(
                "Select Executive ID",
                BUILTIN_EXECUTIVES.iter().map(|s| s.to_string()).collect(),
            ),
            routes: ReferenceList::new(
                "Select Route Name",
                BUILTIN_ROUTES.iter().map(|s| s.to_string()).collect(),
            ),
        }
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_EXECUTIVES: &[&str] = &[
    "660373-Ajith K",
    "660554-Abhilash N",
    "660235-Gireesh V",
    "660482-Joseph Sebastian",
    "660601-Shabeeb T",
    "660200-Vineeth K Sugathan",
    "660185-Abdul Salam PH",
    "660184-Aslam K kareem",
    "660203-Joby Jhony",
    "660199-Binto Mathew",
    "660477-Nandha Gopal",
    "660593-Musharaf PM",
    "660181-Manoj PK",
    "660400-Sandeep Kumar",
    "660597-Kiran V P",
    "660207-Sanju Mthewkutty",
    "660473-Renjith Rajendran",
    "660538-Faisal F",
    "660256-Sreerag JV",
    "660494-Pratheesh G",
    "660515-Harikrishnan S",
];

const BUILTIN_ROUTES: &[&str] = &[
    "KV64-Kasaragod Route",
    "KV24-Irikoor Route",
    "KV29-Alakode Route",
    "KV73-Balussery Route",
    "KV66-Koyilandy Route",
    "KV65-Kanhangadu Route",
    "KV58-Kannur Route",
    "KV50-Chokli Route",
    "KV67-Kuttiady Route",
    "KV72-Kozhikode Route",
    "KV14-Ambalapuzha Route",
    "KV03-Cheruthoni",
    "KV02-Bharananganam",
    "KV11-Aroor Route",
    "KV57-Kumali Route",
    "KV44-Kothamangalam Route",
    "KV06-Erumeli",
    "KV25-Mundakayam Route",
    "KV55-Muvattupuzha Route",
    "KV34-Varapuzha Route",
    "KV04-Munnar",
    "KV32-Amballoor Route",
    "KV76-Edappal Route",
    "KV71-Palakkad Route",
    "KV16-Thanoor",
    "ER162-Pattambi",
    "KV20-Ollur Route",
    "KV61-Manjeri",
    "KV23-Mayanoor Route",
    "KV74-Karunagappally Route",
    "KV33-Charumoodu Route",
    "KV28-Pazhavagadi",
    "KV13-Kulathupuzha Route",
    "KV19-Omalloor Route",
    "KV46-Kazhakoottam Route",
    "KV05-Haripadu",
    "KV39-Aruvikara",
    "KV09-Ezhukon",
    "KV12-Kilimanoor Route",
    "KV21-Vatiyoorkavu",
    "KV78-Edappally Route Ot",
    "KV77-Edappally Route",
    "KV08-Pathanapuram",
];

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_rejected() {
        let data = ReferenceData::builtin();

        assert!(!data.executives.is_valid_selection("Select Executive ID"));
        assert!(!data.routes.is_valid_selection("Select Route Name"));
        assert!(!data.executives.is_valid_selection(""));
    }

    #[test]
    fn test_listed_entries_are_valid() {
        let data = ReferenceData::builtin();

        assert!(data.executives.is_valid_selection("660373-Ajith K"));
        assert!(data.routes.is_valid_selection("KV64-Kasaragod Route"));
    }

    #[test]
    fn test_unknown_entries_are_rejected() {
        let data = ReferenceData::builtin();

        assert!(!data.executives.is_valid_selection("999999-Nobody"));
        assert!(!data.routes.is_valid_selection("KV00-Nowhere"));
    }

    #[test]
    fn test_options_start_with_placeholder() {
        let list = ReferenceList::new(
            "Select Thing",
            vec!["a".to_string(), "b".to_string()],
        );

        assert_eq!(list.options(), vec!["Select Thing", "a", "b"]);
    }

    #[test]
    fn test_reference_data_json_round_trip() {
        let data = ReferenceData::builtin();

        let json = serde_json::to_string(&data).unwrap();
        let restored: ReferenceData = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.executives.entries, data.executives.entries);
        assert_eq!(restored.routes.placeholder, data.routes.placeholder);
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "sales_collection_reference_{}.json",
            uuid::Uuid::new_v4()
        ));
        let data = ReferenceData::builtin();
        std::fs::write(&path, serde_json::to_string(&data).unwrap()).unwrap();

        let loaded = ReferenceData::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.executives.entries.len(), 21);
        assert_eq!(loaded.routes.entries.len(), 43);
    }
}
