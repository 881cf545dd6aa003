use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What part of the extracted source the ingestion caller selected.
///
/// Selection happens before text reaches the normalizer; the pipeline
/// itself is mode-agnostic and only carries the tag as metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    Full,
    Abstract,
    Sections,
}

impl ExtractMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractMode::Full => "full",
            ExtractMode::Abstract => "abstract",
            ExtractMode::Sections => "sections",
        }
    }
}

impl Default for ExtractMode {
    fn default() -> Self {
        ExtractMode::Full
    }
}

/// One ingested source, immutable after creation.
///
/// `raw_text` is whatever the extraction collaborator produced; it has
/// not been normalized yet. Metadata is a sorted map so serialized
/// documents are byte-stable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub source_id: String,
    pub raw_text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(source_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            raw_text: raw_text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_extract_mode(self, mode: ExtractMode) -> Self {
        self.with_metadata("extract_mode", mode.as_str())
    }
}
