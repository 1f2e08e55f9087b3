//! Pure transformation of backend payloads into view descriptions.
//!
//! Nothing here touches the store or the surface; the orchestrator decides
//! when a description is applied.

use crate::model::{
    ComparisonResult, ComparisonRow, ConceptResult, DisplayOptions, Level, Section, TimelineEvent,
};
use serde::Serialize;

pub const MISSING_LEVEL_TEXT: &str = "No explanation available.";
pub const DEFAULT_COMPARISON_SUMMARY: &str =
    "Detailed comparison and analysis of the two concepts.";
pub const NO_COMPARISON_DATA: &str = "No comparison data available.";
pub const NO_RECENT_SEARCHES: &str = "No recent searches.";
pub const NO_FAVORITES: &str = "No favorites yet.";
pub const ADD_FAVORITE_LABEL: &str = "Add to favorites";
pub const REMOVE_FAVORITE_LABEL: &str = "Remove from favorites";

/// Tag the external diagram engine looks for on the element it initializes.
pub const DIAGRAM_TAG: &str = "mermaid";

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct SectionVisibility {
    pub structure: bool,
    pub timeline: bool,
    pub related: bool,
}

impl SectionVisibility {
    pub fn hidden() -> Self {
        Self {
            structure: false,
            timeline: false,
            related: false,
        }
    }

    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Structure => self.structure,
            Section::Timeline => self.timeline,
            Section::Related => self.related,
        }
    }

    pub fn set(&mut self, section: Section, visible: bool) {
        match section {
            Section::Structure => self.structure = visible,
            Section::Timeline => self.timeline = visible,
            Section::Related => self.related = visible,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct LevelBlock {
    pub level: Level,
    pub text: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ConceptView {
    pub title: String,
    pub summary: String,
    pub levels: Vec<LevelBlock>,
    /// Chips, in the order the backend returned them.
    pub related: Vec<String>,
    pub diagram_code: Option<String>,
    pub timeline: Vec<TimelineEvent>,
    pub sections: SectionVisibility,
}

impl ConceptView {
    pub fn level_text(&self, level: Level) -> &str {
        self.levels
            .iter()
            .find(|block| block.level == level)
            .map(|block| block.text.as_str())
            .unwrap_or(MISSING_LEVEL_TEXT)
    }
}

pub fn render_concept(query: &str, result: &ConceptResult, options: &DisplayOptions) -> ConceptView {
    let levels = Level::ALL
        .into_iter()
        .map(|level| {
            let text = result.levels.get(level);
            LevelBlock {
                level,
                text: if text.is_empty() {
                    MISSING_LEVEL_TEXT.to_string()
                } else {
                    text.to_string()
                },
            }
        })
        .collect();

    let diagram_code = result
        .diagram_code
        .as_deref()
        .filter(|code| !code.trim().is_empty())
        .map(str::to_string);
    let timeline = result.timeline.clone().unwrap_or_default();

    let sections = SectionVisibility {
        structure: diagram_code.is_some() && options.show_structure,
        timeline: !timeline.is_empty() && options.show_timeline,
        related: !result.related.is_empty() && options.show_related,
    };

    ConceptView {
        title: query.to_string(),
        summary: result.summary.clone(),
        levels,
        related: result.related.clone(),
        diagram_code,
        timeline,
        sections,
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableRow {
    Values(ComparisonRow),
    /// Single row spanning both value columns.
    Placeholder { message: String },
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct ComparisonView {
    pub header_a: String,
    pub header_b: String,
    pub summary: String,
    pub rows: Vec<TableRow>,
}

pub fn render_comparison(query_a: &str, query_b: &str, result: &ComparisonResult) -> ComparisonView {
    let summary = if result.summary.trim().is_empty() {
        DEFAULT_COMPARISON_SUMMARY.to_string()
    } else {
        result.summary.clone()
    };
    let rows = if result.comparison.is_empty() {
        vec![TableRow::Placeholder {
            message: NO_COMPARISON_DATA.to_string(),
        }]
    } else {
        result
            .comparison
            .iter()
            .cloned()
            .map(TableRow::Values)
            .collect()
    };
    ComparisonView {
        header_a: query_a.to_string(),
        header_b: query_b.to_string(),
        summary,
        rows,
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct HistoryList {
    pub items: Vec<String>,
    pub placeholder: Option<String>,
}

impl HistoryList {
    fn new(items: Vec<String>, placeholder: &str) -> Self {
        let placeholder = items.is_empty().then(|| placeholder.to_string());
        Self { items, placeholder }
    }
}

/// Recent entries offer "search again"; favorite entries offer removal.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct HistoryView {
    pub recent: HistoryList,
    pub favorites: HistoryList,
}

pub fn render_history(recent: Vec<String>, favorites: Vec<String>) -> HistoryView {
    HistoryView {
        recent: HistoryList::new(recent, NO_RECENT_SEARCHES),
        favorites: HistoryList::new(favorites, NO_FAVORITES),
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FavoriteButton {
    pub label: &'static str,
    pub favorited: bool,
}

pub fn favorite_button(favorited: bool) -> FavoriteButton {
    FavoriteButton {
        label: if favorited {
            REMOVE_FAVORITE_LABEL
        } else {
            ADD_FAVORITE_LABEL
        },
        favorited,
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct DiagramElement {
    pub tag: &'static str,
    pub code: String,
}

/// Entry point of the external diagram engine.
pub trait DiagramEngine {
    fn init(&mut self, element: &DiagramElement);
}

/// Host for the single diagram element handed to the engine.
#[derive(Debug, Default, Clone)]
pub struct DiagramContainer {
    children: Vec<DiagramElement>,
}

impl DiagramContainer {
    pub fn children(&self) -> &[DiagramElement] {
        &self.children
    }

    /// Empties the container, inserts one element carrying `code` and runs
    /// the engine on it. Blank markup mounts nothing.
    pub fn mount<E: DiagramEngine + ?Sized>(&mut self, code: &str, engine: &mut E) -> bool {
        if code.trim().is_empty() {
            return false;
        }
        self.children.clear();
        self.children.push(DiagramElement {
            tag: DIAGRAM_TAG,
            code: code.to_string(),
        });
        engine.init(&self.children[0]);
        true
    }
}
