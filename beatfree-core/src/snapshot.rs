//! Serializable tuner state for the surrounding application to persist.

use std::path::Path;

use serde::{Deserialize, Serialize};

use beatfree_types::{DetuneMap, NoteId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerSnapshot {
    pub active_notes: Vec<NoteId>,
    /// Cents per pitch class. Missing pitch classes restore as 0.
    #[serde(default)]
    pub detune_cents: DetuneMap,
}

impl TunerSnapshot {
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to encode snapshot: {}", e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to decode snapshot: {}", e))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatfree_types::PitchClass;

    #[test]
    fn json_uses_note_names() {
        let mut detune = DetuneMap::default();
        detune.set(PitchClass::E, -13.5);
        let snapshot = TunerSnapshot {
            active_notes: vec![NoteId::named("C"), NoteId::named("E'")],
            detune_cents: detune,
        };
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"E'\""));
        assert!(json.contains("-13.5"));
        assert_eq!(TunerSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn detune_is_optional() {
        let snapshot = TunerSnapshot::from_json(r#"{"active_notes": ["G", "B'"]}"#).unwrap();
        assert_eq!(snapshot.active_notes.len(), 2);
        assert!(snapshot.detune_cents.is_empty());
    }

    #[test]
    fn unknown_note_is_rejected() {
        let err = TunerSnapshot::from_json(r#"{"active_notes": ["Q"]}"#).unwrap_err();
        assert!(err.contains("unknown note identifier"));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let snapshot = TunerSnapshot {
            active_notes: vec![NoteId::named("A")],
            detune_cents: DetuneMap::zeroed(),
        };
        snapshot.save(&path).unwrap();
        assert_eq!(TunerSnapshot::load(&path).unwrap(), snapshot);
    }
}
