//! Client controller for an AI-backed concept encyclopedia.
//!
//! A [`ConceptApp`] asks a [`ConceptBackend`] to explain a term or compare
//! two, renders the answer through a [`Surface`], and remembers history,
//! favorites and display options in a [`PersistentStore`].

pub mod app;
pub mod backend;
pub mod error;
pub mod model;
pub mod render;
pub mod store;
pub mod view;
#[cfg(feature = "web")]
pub mod gemini;
#[cfg(feature = "web")]
pub mod web;

pub use app::{
    ConceptApp, ControlState, Dispatch, Inputs, Notice, NoticeKind, RecordingSurface, Surface,
    Trigger, UiEvent,
};
pub use backend::{ConceptBackend, DEFAULT_BACKEND_URL, HttpBackend};
pub use error::AppError;
pub use model::{
    CompareRequest, ComparisonResult, ComparisonRow, ConceptResult, DisplayOptions, Level,
    LevelTexts, SearchRequest, Section, TimelineEvent,
};
pub use render::{
    ComparisonView, ConceptView, DiagramContainer, DiagramElement, DiagramEngine, HistoryView,
    SectionVisibility,
};
pub use store::{DirectoryStore, KeyValueStore, MemoryStore, PersistentStore};
pub use view::{Activation, NavControl, View, ViewController};
