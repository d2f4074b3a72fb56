//! File loaders for behavior events and catalog items.
//!
//! Events are read from JSON Lines, one event object per line:
//! ```jsonl
//! {"user_id": 1, "item_id": 10, "event_type": "view", "timestamp": "2024-05-01T10:00:00Z"}
//! {"user_id": 1, "item_id": 10, "event_type": "purchase", "timestamp": "2024-05-02T09:30:00Z"}
//! ```
//! The catalog is a single JSON array of item objects.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::behavior::{BehaviorEvent, ItemAttributes};
use crate::error::{PrefnetError, Result};

/// Read every event from a JSONL file. Blank lines are skipped; a malformed
/// line fails the whole load with its line number.
pub fn load_events_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<BehaviorEvent>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| PrefnetError::upstream(format!("{}: {e}", path.display())))?;
    let reader = BufReader::new(file);

    let mut events = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: BehaviorEvent = serde_json::from_str(trimmed).map_err(|e| {
            PrefnetError::upstream(format!(
                "{} line {}: {e}",
                path.display(),
                line_num + 1
            ))
        })?;
        events.push(event);
    }

    debug!("loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Read the catalog from a JSON array file.
pub fn load_catalog_json<P: AsRef<Path>>(path: P) -> Result<Vec<ItemAttributes>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| PrefnetError::upstream(format!("{}: {e}", path.display())))?;
    let items: Vec<ItemAttributes> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PrefnetError::upstream(format!("{}: {e}", path.display())))?;

    debug!("loaded {} catalog items from {}", items.len(), path.display());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::EventType;
    use std::io::Write;

    #[test]
    fn test_load_events_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"user_id":1,"item_id":2,"event_type":"view","timestamp":"2024-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"user_id":1,"item_id":2,"event_type":"cart_add","timestamp":"2024-01-02T00:00:00Z","rating":5}}"#
        )
        .unwrap();

        let events = load_events_jsonl(file.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, EventType::CartAdd);
        assert_eq!(events[1].rating, Some(5.0));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = load_events_jsonl(file.path()).unwrap_err();
        assert!(matches!(err, PrefnetError::UpstreamUnavailable(_)));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_load_catalog() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"item_id":1,"category":"frames","price":12.5,"tags":["wood"]}},{{"item_id":2}}]"#
        )
        .unwrap();

        let items = load_catalog_json(file.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tags, vec!["wood".to_string()]);
        assert!(items[1].price.is_none());
    }

    #[test]
    fn test_missing_file_is_upstream_error() {
        let err = load_events_jsonl("/nonexistent/events.jsonl").unwrap_err();
        assert!(matches!(err, PrefnetError::UpstreamUnavailable(_)));
    }
}
