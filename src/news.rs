//! # News Records
//!
//! Immutable input items. Records usually come from the upstream news API as a
//! JSON array; the loader accepts that API's field names as aliases.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CompositorError, Result};

/// Preferred id of the synthesized overview record
pub const OVERVIEW_RECORD_ID: &str = "overview";

/// One news item as delivered by the news source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    /// Stable identifier, assigned from the position when the feed has none
    #[serde(default)]
    pub id: String,

    pub title: String,

    #[serde(default, alias = "description")]
    pub content: String,

    #[serde(default)]
    pub source: String,

    #[serde(default, alias = "ctime")]
    pub timestamp: String,

    /// Set only on the record synthesized from all the others
    #[serde(skip)]
    overview: bool,
}

impl NewsRecord {
    pub fn new<T: Into<String>, C: Into<String>>(id: &str, title: T, content: C) -> Self {
        Self {
            id: id.to_string(),
            title: title.into(),
            content: content.into(),
            source: String::new(),
            timestamp: String::new(),
            overview: false,
        }
    }

    /// The summary record placed ahead of `records`, with an id none of them uses
    pub fn overview_of(records: &[NewsRecord]) -> Self {
        let taken: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let id = unique_id(OVERVIEW_RECORD_ID, |candidate| taken.contains(candidate));
        Self {
            overview: true,
            ..Self::new(&id, "Today's news", "")
        }
    }

    pub fn with_timestamp<S: Into<String>>(mut self, timestamp: S) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Parse the timestamp in the formats the news API is known to use
    pub fn published_at(&self) -> Option<NaiveDateTime> {
        const FORMATS: [&str; 4] = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M:%S",
            "%Y/%m/%d %H:%M:%S",
        ];
        let raw = self.timestamp.trim();
        FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    }

    /// True when there is nothing to narrate
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    pub fn is_overview(&self) -> bool {
        self.overview
    }
}

/// Default id for the record at `index` (0-based)
pub fn default_record_id(index: usize) -> String {
    format!("news-{:03}", index + 1)
}

/// `base`, or `base-2`, `base-3`... whichever is first not `taken`
fn unique_id(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut id = base.to_string();
    let mut n = 2;
    while taken(&id) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    id
}

/// Drop records without any text and make every id unique.
///
/// Explicit ids win over positional ones; a repeated explicit id gets a
/// numeric suffix.
pub fn normalize_records(records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    let records: Vec<(usize, NewsRecord)> = records
        .into_iter()
        .enumerate()
        .filter(|(index, record)| {
            if record.is_blank() {
                warn!("Dropping news record #{} with empty title and content", index + 1);
            }
            !record.is_blank()
        })
        .collect();

    let explicit: HashSet<String> = records
        .iter()
        .map(|(_, record)| record.id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    let mut used: HashSet<String> = HashSet::new();

    records
        .into_iter()
        .map(|(index, mut record)| {
            let given = record.id.trim().to_string();
            let id = if given.is_empty() {
                unique_id(&default_record_id(index), |c| used.contains(c) || explicit.contains(c))
            } else {
                let id = unique_id(&given, |c| used.contains(c));
                if id != given {
                    warn!("Duplicate news record id {:?} renamed to {:?}", given, id);
                }
                id
            };
            used.insert(id.clone());
            record.id = id;
            record
        })
        .collect()
}

/// Load a JSON array of news records from disk
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<NewsRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let records = parse_records(&content)
        .map_err(|e| CompositorError::generic(format!("{}: {}", path.display(), e)))?;
    debug!("Loaded {} news record(s) from {:?}", records.len(), path);
    Ok(records)
}

/// Parse records from either a bare JSON array or the API's `{"result": {"newslist": [...]}}` envelope
pub fn parse_records(json: &str) -> std::result::Result<Vec<NewsRecord>, serde_json::Error> {
    #[derive(Deserialize)]
    struct ApiResult {
        newslist: Vec<NewsRecord>,
    }

    #[derive(Deserialize)]
    struct ApiEnvelope {
        result: ApiResult,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Feed {
        List(Vec<NewsRecord>),
        Envelope(ApiEnvelope),
    }

    let records = match serde_json::from_str::<Feed>(json)? {
        Feed::List(records) => records,
        Feed::Envelope(envelope) => envelope.result.newslist,
    };
    Ok(normalize_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array_assigns_ids() {
        let json = r#"[
            {"title": "First", "content": "Body one"},
            {"id": "custom", "title": "Second", "description": "Body two", "ctime": "2024-05-01 08:30"}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "news-001");
        assert_eq!(records[1].id, "custom");
        assert_eq!(records[1].content, "Body two");
        assert!(records[1].published_at().is_some());
    }

    #[test]
    fn test_parse_api_envelope() {
        let json = r#"{"result": {"newslist": [
            {"title": "Only", "description": "Text", "source": "Wire", "ctime": "2024-05-01 08:30:00"}
        ]}}"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "Wire");
        assert_eq!(records[0].id, "news-001");
    }

    #[test]
    fn test_blank_records_dropped_but_ids_keep_position() {
        let json = r#"[
            {"title": "A"},
            {"title": "  ", "content": ""},
            {"title": "C"}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "news-001");
        assert_eq!(records[1].id, "news-003");
    }

    #[test]
    fn test_ids_are_unique() {
        let records = normalize_records(vec![
            NewsRecord::new("", "A", ""),
            NewsRecord::new("", "B", ""),
            NewsRecord::new("news-002", "C", ""),
            NewsRecord::new("news-002", "D", ""),
        ]);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["news-001", "news-002-2", "news-002", "news-002-3"]);

        // Already unique ids pass through untouched
        let again = normalize_records(records.clone());
        assert_eq!(again, records);
    }

    #[test]
    fn test_overview_is_a_flag_not_an_id() {
        let records = vec![NewsRecord::new("overview", "Local record", "Body")];
        assert!(!records[0].is_overview());

        let overview = NewsRecord::overview_of(&records);
        assert!(overview.is_overview());
        assert_eq!(overview.id, "overview-2");
        assert_eq!(NewsRecord::overview_of(&[]).id, "overview");
    }

    #[test]
    fn test_unparseable_timestamp() {
        let record = NewsRecord::new("x", "t", "c").with_timestamp("yesterday");
        assert!(record.published_at().is_none());
    }
}
