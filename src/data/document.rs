use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::gazetteer::EntryType;

/// Property key holding a document's title, matched as the header field.
pub const TITLE_PROPERTY: &str = "title";

/// An already scraped council document ("Drucksache").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Vec<String>,
    pub url: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Document {
    pub fn header(&self) -> Option<&str> {
        self.properties.get(TITLE_PROPERTY).map(String::as_str)
    }
}

/// Keyword occurrence counts for one document, header and body kept apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMatches {
    pub document_id: String,
    pub header: BTreeMap<String, usize>,
    pub body: BTreeMap<String, usize>,
}

impl DocumentMatches {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty()
    }
}

/// Weighted "document references entry" edge. Header and body matches of the
/// same entry share one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub document_id: String,
    pub entry_type: EntryType,
    pub entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_count: Option<usize>,
}

impl ReferenceEdge {
    /// Merges header and body counts into one edge per matched entry.
    pub fn collapse(entry_type: EntryType, matches: &DocumentMatches) -> Vec<ReferenceEdge> {
        let mut edges: BTreeMap<&str, ReferenceEdge> = BTreeMap::new();
        let edge_for = |entry: &str| ReferenceEdge {
            document_id: matches.document_id.clone(),
            entry_type,
            entry: entry.to_string(),
            header_count: None,
            body_count: None,
        };

        for (entry, count) in &matches.header {
            edges
                .entry(entry.as_str())
                .or_insert_with(|| edge_for(entry))
                .header_count = Some(*count);
        }
        for (entry, count) in &matches.body {
            edges
                .entry(entry.as_str())
                .or_insert_with(|| edge_for(entry))
                .body_count = Some(*count);
        }

        edges.into_values().collect()
    }
}
