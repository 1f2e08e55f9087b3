//! Request orchestration and the controller state shared by every handler.
//!
//! All user-visible changes leave the controller as [`UiEvent`]s delivered
//! to a [`Surface`]; the terminal and JSON front-ends are two such surfaces.

use crate::backend::ConceptBackend;
use crate::error::AppError;
use crate::model::{
    CompareRequest, ComparisonResult, ConceptResult, DisplayOptions, Level, SearchRequest, Section,
};
use crate::render::{
    ComparisonView, ConceptView, DiagramContainer, DiagramElement, DiagramEngine, FavoriteButton,
    HistoryView, SectionVisibility, favorite_button, render_comparison, render_concept,
    render_history,
};
use crate::store::{KeyValueStore, PersistentStore};
use crate::view::{Activation, NavControl, View, ViewController};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const SEARCH_LABEL: &str = "Search";
pub const SEARCHING_LABEL: &str = "Searching...";
pub const COMPARE_LABEL: &str = "Compare";
pub const COMPARING_LABEL: &str = "Comparing...";
pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a search term.";
pub const EMPTY_COMPARE_MESSAGE: &str = "Please enter both concepts to compare.";
pub const NO_FAVORITE_QUERY_MESSAGE: &str = "There is no search term to save as a favorite.";

/// Controls that start a backend request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Search,
    Compare,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct ControlState {
    pub label: &'static str,
    pub enabled: bool,
}

impl ControlState {
    pub fn idle(trigger: Trigger) -> Self {
        let label = match trigger {
            Trigger::Search => SEARCH_LABEL,
            Trigger::Compare => COMPARE_LABEL,
        };
        Self {
            label,
            enabled: true,
        }
    }

    pub fn busy(trigger: Trigger) -> Self {
        let label = match trigger {
            Trigger::Search => SEARCHING_LABEL,
            Trigger::Compare => COMPARING_LABEL,
        };
        Self {
            label,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Validation,
    Error,
}

/// Dismissable user-facing message.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum UiEvent {
    Loading(bool),
    Control {
        trigger: Trigger,
        state: ControlState,
    },
    Notice(Notice),
    Navigation(Activation),
    Concept(ConceptView),
    Comparison(ComparisonView),
    History(HistoryView),
    FavoriteButton(FavoriteButton),
    Section {
        section: Section,
        visible: bool,
    },
    Options(DisplayOptions),
}

/// Rendering target. It also hosts the diagram engine so the controller can
/// hand diagram elements over directly.
pub trait Surface: DiagramEngine {
    fn apply(&mut self, event: UiEvent);
}

/// Surface that keeps every event; for headless embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub events: Vec<UiEvent>,
    pub diagrams: Vec<DiagramElement>,
}

impl RecordingSurface {
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.events.iter().filter_map(|event| match event {
            UiEvent::Notice(notice) => Some(notice),
            _ => None,
        })
    }

    pub fn last_concept(&self) -> Option<&ConceptView> {
        self.events.iter().rev().find_map(|event| match event {
            UiEvent::Concept(view) => Some(view),
            _ => None,
        })
    }

    pub fn last_comparison(&self) -> Option<&ComparisonView> {
        self.events.iter().rev().find_map(|event| match event {
            UiEvent::Comparison(view) => Some(view),
            _ => None,
        })
    }

    pub fn last_history(&self) -> Option<&HistoryView> {
        self.events.iter().rev().find_map(|event| match event {
            UiEvent::History(view) => Some(view),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.diagrams.clear();
    }
}

impl DiagramEngine for RecordingSurface {
    fn init(&mut self, element: &DiagramElement) {
        self.diagrams.push(element.clone());
    }
}

impl Surface for RecordingSurface {
    fn apply(&mut self, event: UiEvent) {
        self.events.push(event);
    }
}

/// Whether a trigger actually ran.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Dispatch {
    Completed,
    /// The trigger control was disabled because the same operation is
    /// already in flight.
    Ignored,
}

/// Text fields and the level selector.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Inputs {
    pub query: String,
    pub level: Level,
    pub compare_a: String,
    pub compare_b: String,
}

struct ControllerState<S, U> {
    store: PersistentStore<S>,
    surface: U,
    views: ViewController,
    options: DisplayOptions,
    sections: SectionVisibility,
    inputs: Inputs,
    search_control: ControlState,
    compare_control: ControlState,
    loading: usize,
    related: Vec<String>,
    diagram: DiagramContainer,
}

impl<S: KeyValueStore, U: Surface> ControllerState<S, U> {
    fn emit(&mut self, event: UiEvent) {
        self.surface.apply(event);
    }

    fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.emit(UiEvent::Notice(Notice {
            kind,
            message: message.into(),
        }));
    }

    fn control_mut(&mut self, trigger: Trigger) -> &mut ControlState {
        match trigger {
            Trigger::Search => &mut self.search_control,
            Trigger::Compare => &mut self.compare_control,
        }
    }

    fn set_control(&mut self, trigger: Trigger, state: ControlState) {
        *self.control_mut(trigger) = state;
        self.emit(UiEvent::Control { trigger, state });
    }

    fn begin(&mut self, trigger: Trigger) {
        self.loading += 1;
        if self.loading == 1 {
            self.emit(UiEvent::Loading(true));
        }
        self.set_control(trigger, ControlState::busy(trigger));
    }

    fn finish(&mut self, trigger: Trigger) {
        self.set_control(trigger, ControlState::idle(trigger));
        self.loading = self.loading.saturating_sub(1);
        if self.loading == 0 {
            self.emit(UiEvent::Loading(false));
        }
    }

    fn navigate(&mut self, activation: Activation) {
        self.emit(UiEvent::Navigation(activation));
        if activation.refresh_history {
            self.render_history();
        }
    }

    fn render_history(&mut self) {
        let view = render_history(self.store.history(), self.store.favorites());
        self.emit(UiEvent::History(view));
    }

    fn refresh_favorite_button(&mut self, query: &str) {
        let button = favorite_button(self.store.is_favorite(query));
        self.emit(UiEvent::FavoriteButton(button));
    }

    fn set_section(&mut self, section: Section, visible: bool) {
        self.sections.set(section, visible);
        self.emit(UiEvent::Section { section, visible });
    }

    fn show_concept(&mut self, query: &str, result: &ConceptResult) {
        let view = render_concept(query, result, &self.options);
        if let Some(code) = view.diagram_code.as_deref() {
            self.diagram.mount(code, &mut self.surface);
        }
        self.sections = view.sections;
        self.related = view.related.clone();
        self.emit(UiEvent::Concept(view));

        let activation = self.views.show_result();
        self.navigate(activation);
        self.store.add_history(query);
        self.refresh_favorite_button(query);
    }

    fn show_comparison(&mut self, query_a: &str, query_b: &str, result: &ComparisonResult) {
        let view = render_comparison(query_a, query_b, result);
        self.emit(UiEvent::Comparison(view));
        let activation = self.views.activate_control(NavControl::Compare);
        self.navigate(activation);
    }
}

/// The application controller: one backend, one store, one surface.
pub struct ConceptApp<B, S, U> {
    backend: B,
    state: Mutex<ControllerState<S, U>>,
}

impl<B, S, U> ConceptApp<B, S, U>
where
    B: ConceptBackend,
    S: KeyValueStore + Send,
    U: Surface + Send,
{
    pub fn new(backend: B, store: PersistentStore<S>, surface: U) -> Self {
        Self {
            backend,
            state: Mutex::new(ControllerState {
                store,
                surface,
                views: ViewController::new(),
                options: DisplayOptions::default(),
                sections: SectionVisibility::hidden(),
                inputs: Inputs::default(),
                search_control: ControlState::idle(Trigger::Search),
                compare_control: ControlState::idle(Trigger::Compare),
                loading: 0,
                related: Vec::new(),
                diagram: DiagramContainer::default(),
            }),
        }
    }

    /// Loads options, applies them to the option controls and sections, and
    /// activates the home control.
    pub fn startup(&self) {
        let mut state = self.state.lock();
        let options = state.store.load_options();
        state.options = options;
        state.emit(UiEvent::Options(options));
        for section in Section::ALL {
            state.set_section(section, options.get(section));
        }
        state.inputs.level = Level::default();
        for trigger in [Trigger::Search, Trigger::Compare] {
            state.set_control(trigger, ControlState::idle(trigger));
        }
        if let Some(activation) = state.views.activate(Some(NavControl::Home.id())) {
            state.navigate(activation);
        }
        debug!(?options, "controller started");
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Activates a navigation control by id. Unknown ids change nothing.
    pub fn navigate(&self, control_id: Option<&str>) -> Option<Activation> {
        let mut state = self.state.lock();
        let activation = state.views.activate(control_id)?;
        state.navigate(activation);
        Some(activation)
    }

    pub async fn search(&self, query: &str, level: Level) -> Result<Dispatch, AppError> {
        let query = query.trim().to_string();
        {
            let mut state = self.state.lock();
            if !state.search_control.enabled {
                debug!(%query, "search already in flight; ignoring trigger");
                return Ok(Dispatch::Ignored);
            }
            if query.is_empty() {
                state.notify(NoticeKind::Validation, EMPTY_QUERY_MESSAGE);
                return Err(AppError::validation(EMPTY_QUERY_MESSAGE));
            }
            state.inputs.query = query.clone();
            state.inputs.level = level;
            state.begin(Trigger::Search);
        }

        info!(%query, %level, "searching concept");
        let request = SearchRequest {
            query: query.clone(),
            level,
        };
        let outcome = self.backend.search(&request).await;

        let mut state = self.state.lock();
        let result = match outcome {
            Ok(result) => {
                state.show_concept(&query, &result);
                Ok(Dispatch::Completed)
            }
            Err(err) => {
                warn!(%query, error = %err, "search failed");
                state.notify(NoticeKind::Error, format!("Search failed: {err}"));
                Err(err)
            }
        };
        state.finish(Trigger::Search);
        result
    }

    pub async fn compare(&self, query_a: &str, query_b: &str) -> Result<Dispatch, AppError> {
        let query_a = query_a.trim().to_string();
        let query_b = query_b.trim().to_string();
        {
            let mut state = self.state.lock();
            if !state.compare_control.enabled {
                debug!("comparison already in flight; ignoring trigger");
                return Ok(Dispatch::Ignored);
            }
            if query_a.is_empty() || query_b.is_empty() {
                state.notify(NoticeKind::Validation, EMPTY_COMPARE_MESSAGE);
                return Err(AppError::validation(EMPTY_COMPARE_MESSAGE));
            }
            state.inputs.compare_a = query_a.clone();
            state.inputs.compare_b = query_b.clone();
            state.begin(Trigger::Compare);
        }

        info!(%query_a, %query_b, "comparing concepts");
        let request = CompareRequest {
            concept_a: query_a.clone(),
            concept_b: query_b.clone(),
        };
        let outcome = self.backend.compare(&request).await;

        let mut state = self.state.lock();
        let result = match outcome {
            Ok(result) => {
                state.show_comparison(&query_a, &query_b, &result);
                Ok(Dispatch::Completed)
            }
            Err(err) => {
                warn!(error = %err, "comparison failed");
                state.notify(NoticeKind::Error, format!("Comparison failed: {err}"));
                Err(err)
            }
        };
        state.finish(Trigger::Compare);
        result
    }

    /// Runs a search with the current query input and level.
    pub async fn submit_search(&self) -> Result<Dispatch, AppError> {
        let inputs = self.inputs();
        self.search(&inputs.query, inputs.level).await
    }

    pub async fn submit_compare(&self) -> Result<Dispatch, AppError> {
        let inputs = self.inputs();
        self.compare(&inputs.compare_a, &inputs.compare_b).await
    }

    /// Activates the related-concept chip at `index` of the last result.
    pub async fn select_related(&self, index: usize) -> Result<Dispatch, AppError> {
        let (concept, level) = {
            let mut state = self.state.lock();
            let Some(concept) = state.related.get(index).cloned() else {
                debug!(index, "no related concept at index");
                return Ok(Dispatch::Ignored);
            };
            state.inputs.query = concept.clone();
            (concept, state.inputs.level)
        };
        self.search(&concept, level).await
    }

    /// "Search again" from a history entry.
    pub async fn search_again(&self, query: &str) -> Result<Dispatch, AppError> {
        let level = {
            let mut state = self.state.lock();
            state.inputs.query = query.to_string();
            state.inputs.level
        };
        self.search(query, level).await
    }

    /// Favorites or un-favorites the current query input.
    pub fn toggle_favorite(&self) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        let query = state.inputs.query.trim().to_string();
        if query.is_empty() {
            state.notify(NoticeKind::Validation, NO_FAVORITE_QUERY_MESSAGE);
            return Err(AppError::validation(NO_FAVORITE_QUERY_MESSAGE));
        }
        let now_favorite = state.store.toggle_favorite(&query);
        let message = if now_favorite {
            format!("\"{query}\" was added to favorites.")
        } else {
            format!("\"{query}\" was removed from favorites.")
        };
        state.notify(NoticeKind::Info, message);
        state.refresh_favorite_button(&query);
        Ok(now_favorite)
    }

    /// Removal from the favorites list of the History view.
    pub fn remove_favorite(&self, query: &str) {
        let mut state = self.state.lock();
        state.store.remove_favorite(query);
        state.notify(
            NoticeKind::Info,
            format!("\"{query}\" was removed from favorites."),
        );
        state.render_history();
        if state.inputs.query.trim() == query {
            state.refresh_favorite_button(query);
        }
    }

    /// Option toggle: flips section visibility now and persists all three.
    pub fn set_option(&self, section: Section, enabled: bool) {
        let mut state = self.state.lock();
        state.options.set(section, enabled);
        state.set_section(section, enabled);
        let options = state.options;
        state.store.save_options(&options);
        debug!(section = section.label(), enabled, "option changed");
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.state.lock().inputs.query = query.into();
    }

    pub fn set_level(&self, level: Level) {
        self.state.lock().inputs.level = level;
    }

    pub fn set_compare_inputs(&self, query_a: impl Into<String>, query_b: impl Into<String>) {
        let mut state = self.state.lock();
        state.inputs.compare_a = query_a.into();
        state.inputs.compare_b = query_b.into();
    }

    pub fn inputs(&self) -> Inputs {
        self.state.lock().inputs.clone()
    }

    pub fn active_view(&self) -> View {
        self.state.lock().views.active_view()
    }

    pub fn active_control(&self) -> NavControl {
        self.state.lock().views.active_control()
    }

    pub fn control_state(&self, trigger: Trigger) -> ControlState {
        let state = self.state.lock();
        match trigger {
            Trigger::Search => state.search_control,
            Trigger::Compare => state.compare_control,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading > 0
    }

    pub fn options(&self) -> DisplayOptions {
        self.state.lock().options
    }

    pub fn sections(&self) -> SectionVisibility {
        self.state.lock().sections
    }

    pub fn related(&self) -> Vec<String> {
        self.state.lock().related.clone()
    }

    pub fn diagram(&self) -> Vec<DiagramElement> {
        self.state.lock().diagram.children().to_vec()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().store.history()
    }

    pub fn favorites(&self) -> Vec<String> {
        self.state.lock().store.favorites()
    }

    /// Runs `f` against the surface.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut U) -> R) -> R {
        f(&mut self.state.lock().surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComparisonRow, LevelTexts};
    use crate::render::{MISSING_LEVEL_TEXT, TableRow};
    use crate::store::{MemoryStore, OPTIONS_KEY};
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct FakeBackend {
        concept: Result<ConceptResult, AppError>,
        comparison: Result<ComparisonResult, AppError>,
        requests: Mutex<Vec<String>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn new(concept: Result<ConceptResult, AppError>) -> Self {
            Self {
                concept,
                comparison: Ok(ComparisonResult::default()),
                requests: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn with_comparison(mut self, comparison: Result<ComparisonResult, AppError>) -> Self {
            self.comparison = comparison;
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    impl ConceptBackend for FakeBackend {
        async fn search(&self, request: &SearchRequest) -> Result<ConceptResult, AppError> {
            self.requests
                .lock()
                .push(format!("search:{}:{}", request.query, request.level));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.concept.clone()
        }

        async fn compare(&self, request: &CompareRequest) -> Result<ComparisonResult, AppError> {
            self.requests
                .lock()
                .push(format!("compare:{}:{}", request.concept_a, request.concept_b));
            self.comparison.clone()
        }
    }

    type TestApp = ConceptApp<FakeBackend, MemoryStore, RecordingSurface>;

    fn gravity() -> ConceptResult {
        ConceptResult {
            summary: "S".into(),
            levels: LevelTexts {
                basic: "B".into(),
                intermediate: String::new(),
                advanced: String::new(),
            },
            related: vec!["force".into()],
            diagram_code: Some("graph TD; A-->B".into()),
            timeline: Some(Vec::new()),
        }
    }

    fn server_error() -> AppError {
        AppError::RequestFailed {
            status: 500,
            reason: "Internal Server Error".into(),
            details: None,
        }
    }

    fn app_with(backend: FakeBackend, store: MemoryStore) -> TestApp {
        let app = ConceptApp::new(
            backend,
            PersistentStore::new(store),
            RecordingSurface::default(),
        );
        app.startup();
        app
    }

    fn app(backend: FakeBackend) -> TestApp {
        app_with(backend, MemoryStore::new())
    }

    #[test]
    fn startup_applies_stored_options() {
        let store = MemoryStore::new().with_entry(
            OPTIONS_KEY,
            r#"{"showStructure":false,"showTimeline":true,"showRelated":false}"#,
        );
        let app = app_with(FakeBackend::new(Ok(gravity())), store);
        assert!(!app.options().show_structure);
        assert!(!app.sections().structure);
        assert!(app.sections().timeline);
        assert_eq!(app.active_view(), View::Home);
        assert_eq!(app.inputs().level, Level::Intermediate);
    }

    #[tokio::test]
    async fn gravity_scenario() {
        let app = app(FakeBackend::new(Ok(gravity())));
        let outcome = app.search("gravity", Level::Basic).await.unwrap();
        assert_eq!(outcome, Dispatch::Completed);

        assert_eq!(app.active_view(), View::Result);
        assert_eq!(app.active_control(), NavControl::Home);
        let sections = app.sections();
        assert!(sections.structure);
        assert!(!sections.timeline);
        assert!(sections.related);
        assert_eq!(app.related(), vec!["force"]);
        assert_eq!(app.history()[0], "gravity");
        assert_eq!(app.diagram()[0].code, "graph TD; A-->B");
        assert_eq!(app.control_state(Trigger::Search), ControlState::idle(Trigger::Search));
        assert!(!app.is_loading());

        app.with_surface(|surface| {
            let view = surface.last_concept().unwrap();
            assert_eq!(view.level_text(Level::Intermediate), MISSING_LEVEL_TEXT);
            assert_eq!(view.level_text(Level::Advanced), MISSING_LEVEL_TEXT);
            assert_eq!(surface.diagrams.len(), 1);
            assert_eq!(
                surface.events.last(),
                Some(&UiEvent::Loading(false)),
                "loading indicator must be hidden last"
            );
        });
        assert_eq!(
            app.backend().requests.lock().as_slice(),
            ["search:gravity:basic"]
        );
    }

    #[tokio::test]
    async fn empty_query_never_reaches_backend() {
        let app = app(FakeBackend::new(Ok(gravity())));
        let err = app.search("   ", Level::Basic).await.unwrap_err();
        assert!(err.is_validation());
        assert!(app.backend().requests.lock().is_empty());
        assert_eq!(app.active_view(), View::Home);
        app.with_surface(|surface| {
            let notice = surface.notices().last().unwrap();
            assert_eq!(notice.kind, NoticeKind::Validation);
            assert!(!surface.events.contains(&UiEvent::Loading(true)));
        });
    }

    #[tokio::test]
    async fn failed_comparison_restores_controls() {
        let backend = FakeBackend::new(Ok(gravity())).with_comparison(Err(server_error()));
        let app = app(backend);
        let err = app.compare("steam engine", "turbine").await.unwrap_err();
        assert!(matches!(err, AppError::RequestFailed { status: 500, .. }));

        assert_ne!(app.active_view(), View::Compare);
        assert_eq!(
            app.control_state(Trigger::Compare),
            ControlState {
                label: COMPARE_LABEL,
                enabled: true
            }
        );
        assert!(!app.is_loading());
        app.with_surface(|surface| {
            assert!(surface.last_comparison().is_none());
            let notice = surface.notices().last().unwrap();
            assert_eq!(notice.kind, NoticeKind::Error);
            assert!(notice.message.contains("500"));
        });
    }

    #[tokio::test]
    async fn comparison_switches_to_compare_view() {
        let backend = FakeBackend::new(Ok(gravity())).with_comparison(Ok(ComparisonResult {
            summary: String::new(),
            comparison: vec![ComparisonRow {
                criteria: "Goal".into(),
                concept_a: "Piston".into(),
                concept_b: "Rotor".into(),
            }],
        }));
        let app = app(backend);
        app.set_compare_inputs(" steam engine ", "turbine");
        app.submit_compare().await.unwrap();
        assert_eq!(app.active_view(), View::Compare);
        assert_eq!(app.active_control(), NavControl::Compare);
        app.with_surface(|surface| {
            let view = surface.last_comparison().unwrap();
            assert_eq!(view.header_a, "steam engine");
            assert!(matches!(view.rows[0], TableRow::Values(_)));
        });
        assert!(app.history().is_empty(), "comparisons are not recorded");
    }

    #[tokio::test]
    async fn compare_requires_both_concepts() {
        let app = app(FakeBackend::new(Ok(gravity())));
        let err = app.compare("steam engine", " ").await.unwrap_err();
        assert_eq!(err, AppError::validation(EMPTY_COMPARE_MESSAGE));
        assert!(app.backend().requests.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_search_leaves_view_and_history_alone() {
        let app = app(FakeBackend::new(Err(AppError::transport("connection refused"))));
        assert!(app.search("gravity", Level::Basic).await.is_err());
        assert_eq!(app.active_view(), View::Home);
        assert!(app.history().is_empty());
        assert!(app.control_state(Trigger::Search).enabled);
    }

    #[tokio::test]
    async fn chip_reenters_search_with_current_level() {
        let app = app(FakeBackend::new(Ok(gravity())));
        app.search("gravity", Level::Advanced).await.unwrap();
        assert_eq!(app.select_related(0).await.unwrap(), Dispatch::Completed);
        assert_eq!(app.select_related(9).await.unwrap(), Dispatch::Ignored);
        assert_eq!(app.inputs().query, "force");
        assert_eq!(app.history(), vec!["force", "gravity"]);
        assert_eq!(
            app.backend().requests.lock().as_slice(),
            ["search:gravity:advanced", "search:force:advanced"]
        );
        assert!(app.control_state(Trigger::Search).enabled);
    }

    #[tokio::test]
    async fn search_in_flight_disables_only_its_own_trigger() {
        let gate = Arc::new(Notify::new());
        let backend = FakeBackend::new(Ok(gravity())).gated(gate.clone());
        let app = Arc::new(app(backend));

        let running = {
            let app = app.clone();
            tokio::spawn(async move { app.search("gravity", Level::Basic).await })
        };
        while app.control_state(Trigger::Search).enabled {
            tokio::task::yield_now().await;
        }
        assert_eq!(app.control_state(Trigger::Search).label, SEARCHING_LABEL);
        assert_eq!(
            app.search("entropy", Level::Basic).await.unwrap(),
            Dispatch::Ignored
        );
        assert!(app.is_loading());

        app.compare("steam engine", "turbine").await.unwrap();
        assert!(app.is_loading(), "search still owns the indicator");

        gate.notify_one();
        assert_eq!(running.await.unwrap().unwrap(), Dispatch::Completed);
        assert!(!app.is_loading());
        assert_eq!(app.history(), vec!["gravity"]);
    }

    #[tokio::test]
    async fn favorite_button_tracks_current_query() {
        let app = app(FakeBackend::new(Ok(gravity())));
        assert!(app.toggle_favorite().unwrap_err().is_validation());

        app.search("gravity", Level::Basic).await.unwrap();
        assert!(app.toggle_favorite().unwrap());
        app.with_surface(|surface| {
            let button = surface.events.iter().rev().find_map(|event| match event {
                UiEvent::FavoriteButton(button) => Some(button.clone()),
                _ => None,
            });
            assert!(button.unwrap().favorited);
        });
        assert!(!app.toggle_favorite().unwrap());
        assert!(app.favorites().is_empty());
    }

    #[tokio::test]
    async fn history_view_is_rebuilt_on_activation() {
        let app = app(FakeBackend::new(Ok(gravity())));
        app.search("gravity", Level::Basic).await.unwrap();
        app.toggle_favorite().unwrap();
        app.navigate(Some("history")).unwrap();
        app.with_surface(|surface| {
            let history = surface.last_history().unwrap();
            assert_eq!(history.recent.items, vec!["gravity"]);
            assert_eq!(history.favorites.items, vec!["gravity"]);
        });

        app.remove_favorite("gravity");
        app.with_surface(|surface| {
            let history = surface.last_history().unwrap();
            assert!(history.favorites.items.is_empty());
            assert!(history.favorites.placeholder.is_some());
        });
    }

    #[test]
    fn null_navigation_emits_nothing() {
        let app = app(FakeBackend::new(Ok(gravity())));
        let before = app.with_surface(|surface| surface.events.len());
        assert!(app.navigate(None).is_none());
        assert!(app.navigate(Some("result")).is_none());
        assert_eq!(app.with_surface(|surface| surface.events.len()), before);
        assert_eq!(app.active_view(), View::Home);
    }

    #[tokio::test]
    async fn option_toggle_changes_visibility_without_fetching() {
        let app = app(FakeBackend::new(Ok(gravity())));
        app.search("gravity", Level::Basic).await.unwrap();
        app.set_option(Section::Related, false);
        assert!(!app.sections().related);
        app.set_option(Section::Timeline, true);
        assert!(app.sections().timeline);
        assert_eq!(app.backend().requests.lock().len(), 1);

        app.search("gravity", Level::Basic).await.unwrap();
        assert!(!app.sections().related, "options apply on every render");
    }

    #[test]
    fn options_persist_across_controllers() {
        let app = app(FakeBackend::new(Ok(gravity())));
        app.set_option(Section::Structure, false);
        let store = app.state.lock().store.backend().clone();
        let reopened = app_with(FakeBackend::new(Ok(gravity())), store);
        assert!(!reopened.options().show_structure);
        assert!(reopened.options().show_related);
    }
}
