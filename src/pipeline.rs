//! Two-phase import boundary: a read-only preview producing parsed records
//! and match candidates for operator review, and an execute phase that
//! performs the writes with the confirmed mappings.

use crate::error::Result;
use crate::matcher::{SongMatcher, SongMatchResult};
use crate::parser::{self, ParseOutcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Preview payload returned to the operator. No writes happen here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportPreview {
    pub outcome: ParseOutcome,
    /// One result per distinct original-song name, in first-seen order.
    pub matches: Vec<SongMatchResult>,
}

/// Operator-confirmed decisions for names the matcher could not settle,
/// keyed by the original-song name as it appears in the CSV.
#[derive(Debug, Default, Deserialize)]
pub struct OperatorMappings {
    #[serde(default)]
    pub mappings: HashMap<String, String>,
    #[serde(default)]
    pub custom_names: HashMap<String, String>,
}

impl OperatorMappings {
    /// Load a mappings file from disk
    /// (`{"mappings": {name: song_id}, "custom_names": {name: text}}`).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mappings = serde_json::from_str(&text)?;
        Ok(mappings)
    }
}

/// Parse legacy CSV text and match every distinct original-song name.
pub async fn preview(csv_text: &str, matcher: &SongMatcher) -> Result<ImportPreview> {
    let outcome = parser::parse(csv_text);

    let mut names: Vec<String> = Vec::new();
    for record in &outcome.records {
        for name in &record.original_songs {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    let matches = matcher.match_songs(&names).await?;

    Ok(ImportPreview { outcome, matches })
}
