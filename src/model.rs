use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Explanation depth requested from the backend.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Basic, Level::Intermediate, Level::Advanced];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Basic => "basic",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Level::Basic),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            other => Err(format!(
                "unknown level {other:?} (expected basic, intermediate or advanced)"
            )),
        }
    }
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub level: Level,
}

/// Body of `POST /api/compare`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub concept_a: String,
    pub concept_b: String,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct LevelTexts {
    #[serde(default)]
    pub basic: String,
    #[serde(default)]
    pub intermediate: String,
    #[serde(default)]
    pub advanced: String,
}

impl LevelTexts {
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::Basic => &self.basic,
            Level::Intermediate => &self.intermediate,
            Level::Advanced => &self.advanced,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub year: String,
    pub event: String,
}

/// Successful `/api/search` payload.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptResult {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub levels: LevelTexts,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TimelineEvent>>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub criteria: String,
    pub concept_a: String,
    pub concept_b: String,
}

/// Successful `/api/compare` payload.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub comparison: Vec<ComparisonRow>,
}

/// Error body returned by the facade for any non-2xx response.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub details: String,
}

fn default_true() -> bool {
    true
}

/// Persisted visibility switches for the optional result sections.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    #[serde(default = "default_true")]
    pub show_structure: bool,
    #[serde(default = "default_true")]
    pub show_timeline: bool,
    #[serde(default = "default_true")]
    pub show_related: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_structure: true,
            show_timeline: true,
            show_related: true,
        }
    }
}

/// The three optional result sections, each gated by one option.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Structure,
    Timeline,
    Related,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Structure, Section::Timeline, Section::Related];

    pub fn label(self) -> &'static str {
        match self {
            Section::Structure => "structure",
            Section::Timeline => "timeline",
            Section::Related => "related",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "structure" | "diagram" => Ok(Section::Structure),
            "timeline" => Ok(Section::Timeline),
            "related" => Ok(Section::Related),
            other => Err(format!("unknown section {other:?}")),
        }
    }
}

impl DisplayOptions {
    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Structure => self.show_structure,
            Section::Timeline => self.show_timeline,
            Section::Related => self.show_related,
        }
    }

    pub fn set(&mut self, section: Section, enabled: bool) {
        match section {
            Section::Structure => self.show_structure = enabled,
            Section::Timeline => self.show_timeline = enabled,
            Section::Related => self.show_related = enabled,
        }
    }
}
