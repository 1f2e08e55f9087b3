use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use atty::Stream;
use clap::{Parser, Subcommand};
use nexapedia_rs::render::{DiagramElement, DiagramEngine, HistoryList, TableRow};
use nexapedia_rs::{
    ComparisonView, ConceptApp, ConceptView, DEFAULT_BACKEND_URL, DirectoryStore, DisplayOptions,
    HistoryView, HttpBackend, Level, NavControl, Notice, NoticeKind, PersistentStore, Section,
    Surface, UiEvent, View,
};
use termimad::{FmtText, MadSkin, terminal_size};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

type CliApp = ConceptApp<HttpBackend, DirectoryStore, CliSurface>;

#[derive(Parser, Debug)]
#[command(
    name = "nexapedia",
    about = "Explain, diagram and compare concepts with an AI backend",
    version
)]
pub struct Cli {
    /// Emit newline-delimited JSON events instead of formatted text.
    #[arg(long, global = true)]
    json: bool,

    /// Base URL of the concept backend.
    #[arg(long, global = true, env = "NEXAPEDIA_BACKEND", default_value = DEFAULT_BACKEND_URL)]
    backend: String,

    /// Directory holding history, favorites and display options.
    #[arg(long, global = true, env = "NEXAPEDIA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explain a single concept.
    Search {
        /// Concept to look up.
        #[arg(required = true)]
        query: Vec<String>,
        /// Explanation depth to request.
        #[arg(short, long, default_value_t = Level::Intermediate)]
        level: Level,
    },
    /// Compare two concepts side by side.
    Compare {
        /// First concept.
        concept_a: String,
        /// Second concept.
        concept_b: String,
    },
    /// Show recent searches and favorites.
    History,
    /// Add a concept to the favorites, or remove it if already present.
    Favorite {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Remove a concept from the favorites.
    Unfavorite {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show or change which optional result sections are displayed.
    Options {
        /// Show the structure diagram section.
        #[arg(long)]
        structure: Option<bool>,
        /// Show the timeline section.
        #[arg(long)]
        timeline: Option<bool>,
        /// Show the related concepts section.
        #[arg(long)]
        related: Option<bool>,
    },
    /// Interactive session keeping one controller alive.
    Shell,
    /// Run the backend facade in front of the Gemini API.
    #[cfg(feature = "web")]
    Serve {
        /// Socket address to bind.
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: std::net::SocketAddr,
        /// Gemini model name.
        #[arg(long, default_value = nexapedia_rs::gemini::DEFAULT_GEMINI_MODEL)]
        model: String,
        /// Directory of static files served for non-API paths.
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

pub fn run() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(cli))
}

fn init_tracing(command: &Command) {
    let default_level = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let Cli {
        json,
        backend,
        data_dir,
        command,
    } = cli;
    let config = ClientConfig {
        json,
        backend_url: backend,
        data_dir: data_dir.unwrap_or_else(DirectoryStore::default_location),
    };

    let succeeded = match command {
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            model,
            static_dir,
        } => {
            let model = nexapedia_rs::gemini::GeminiModel::from_env(model)?;
            let config = nexapedia_rs::web::FacadeConfig { addr, static_dir };
            nexapedia_rs::web::serve(config, model).await?;
            true
        }
        Command::Search { query, level } => {
            let app = config.start(false)?;
            app.search(&query.join(" "), level).await.is_ok()
        }
        Command::Compare {
            concept_a,
            concept_b,
        } => {
            let app = config.start(false)?;
            app.compare(&concept_a, &concept_b).await.is_ok()
        }
        Command::History => {
            let app = config.start(false)?;
            app.navigate(Some(NavControl::History.id())).is_some()
        }
        Command::Favorite { query } => {
            let app = config.start(false)?;
            app.set_query(query.join(" "));
            app.toggle_favorite().is_ok()
        }
        Command::Unfavorite { query } => {
            let app = config.start(false)?;
            app.remove_favorite(query.join(" ").trim());
            true
        }
        Command::Options {
            structure,
            timeline,
            related,
        } => {
            let app = config.start(false)?;
            for (section, value) in [
                (Section::Structure, structure),
                (Section::Timeline, timeline),
                (Section::Related, related),
            ] {
                if let Some(enabled) = value {
                    app.set_option(section, enabled);
                }
            }
            if !config.json {
                print_options(&app.options());
            }
            true
        }
        Command::Shell => {
            let app = config.start(true)?;
            run_shell(&app, config.json).await?;
            true
        }
    };
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Where the client talks to and keeps its state.
#[derive(Debug, Clone)]
struct ClientConfig {
    json: bool,
    backend_url: String,
    data_dir: PathBuf,
}

impl ClientConfig {
    /// Opens the store, builds the controller and runs its startup sequence.
    fn start(&self, interactive: bool) -> Result<CliApp, Box<dyn Error>> {
        let store = DirectoryStore::open(self.data_dir.clone()).map_err(|err| {
            format!(
                "Failed to open data directory {}: {err}",
                self.data_dir.display()
            )
        })?;
        let surface = if self.json {
            CliSurface::Json
        } else {
            CliSurface::Terminal(TerminalSurface::new(interactive))
        };
        let app = ConceptApp::new(
            HttpBackend::new(self.backend_url.clone()),
            PersistentStore::new(store),
            surface,
        );
        app.startup();
        Ok(app)
    }
}

const SHELL_HELP: &str = "\
Commands:
  search <query>          explain a concept (alias: s)
  level <level>           basic, intermediate or advanced
  compare <a> | <b>       compare two concepts (alias: c)
  related <n>             follow the n-th related concept
  again <n>               repeat the n-th recent search
  fav                     toggle the current query as a favorite
  unfav <query|n>         remove a favorite
  nav <home|compare|history>
  opt <structure|timeline|related> <on|off>
  help, quit";

async fn run_shell(app: &CliApp, as_json: bool) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !as_json {
            print!("nexapedia> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map(|(command, rest)| (command, rest.trim()))
            .unwrap_or((line, ""));

        match command {
            "quit" | "exit" | "q" => break,
            "help" | "?" => println!("{SHELL_HELP}"),
            "search" | "s" => {
                app.set_query(rest);
                let _ = app.submit_search().await;
            }
            "level" => match rest.parse::<Level>() {
                Ok(level) => app.set_level(level),
                Err(err) => eprintln!("{err}"),
            },
            "compare" | "c" => {
                let (a, b) = split_pair(rest);
                app.set_compare_inputs(a, b);
                let _ = app.submit_compare().await;
            }
            "related" | "r" => match parse_index(rest) {
                Some(index) => {
                    let _ = app.select_related(index).await;
                }
                None => eprintln!("usage: related <n>"),
            },
            "again" => match parse_index(rest).and_then(|index| app.history().get(index).cloned()) {
                Some(query) => {
                    let _ = app.search_again(&query).await;
                }
                None => eprintln!("usage: again <n> (see `nav history`)"),
            },
            "fav" => {
                let _ = app.toggle_favorite();
            }
            "unfav" => {
                let query = parse_index(rest)
                    .and_then(|index| app.favorites().get(index).cloned())
                    .unwrap_or_else(|| rest.to_string());
                app.remove_favorite(&query);
            }
            "nav" => {
                if app.navigate(Some(rest)).is_none() {
                    eprintln!("unknown view {rest:?}; try home, compare or history");
                }
            }
            "opt" => match parse_option(rest) {
                Some((section, enabled)) => app.set_option(section, enabled),
                None => eprintln!("usage: opt <structure|timeline|related> <on|off>"),
            },
            other => eprintln!("unknown command {other:?}; type `help`"),
        }
    }
    Ok(())
}

fn split_pair(input: &str) -> (String, String) {
    let (a, b) = input
        .split_once('|')
        .or_else(|| input.split_once(" vs "))
        .unwrap_or((input, ""));
    (a.trim().to_string(), b.trim().to_string())
}

/// One-based index from the user, zero-based for the controller.
fn parse_index(input: &str) -> Option<usize> {
    input.trim().parse::<usize>().ok()?.checked_sub(1)
}

fn parse_option(input: &str) -> Option<(Section, bool)> {
    let mut parts = input.split_whitespace();
    let section = parts.next()?.parse::<Section>().ok()?;
    let enabled = match parts.next()? {
        "on" | "true" | "yes" | "show" => true,
        "off" | "false" | "no" | "hide" => false,
        _ => return None,
    };
    Some((section, enabled))
}

enum CliSurface {
    Terminal(TerminalSurface),
    Json,
}

impl DiagramEngine for CliSurface {
    fn init(&mut self, element: &DiagramElement) {
        match self {
            CliSurface::Terminal(surface) => surface.init(element),
            CliSurface::Json => print_json(&serde_json::json!({
                "event": "diagram",
                "data": element,
            })),
        }
    }
}

impl Surface for CliSurface {
    fn apply(&mut self, event: UiEvent) {
        match self {
            CliSurface::Terminal(surface) => surface.apply(event),
            CliSurface::Json => print_json(&event),
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => tracing::warn!(error = %err, "failed to encode event"),
    }
}

/// Human-readable surface. Sections print once; later option changes only
/// report the new visibility.
struct TerminalSurface {
    interactive: bool,
    pending_diagram: Option<String>,
}

impl TerminalSurface {
    fn new(interactive: bool) -> Self {
        Self {
            interactive,
            pending_diagram: None,
        }
    }

    fn notice(&self, notice: &Notice) {
        match notice.kind {
            NoticeKind::Info => println!("{}", notice.message),
            NoticeKind::Validation => eprintln!("! {}", notice.message),
            NoticeKind::Error => eprintln!("error: {}", notice.message),
        }
    }

    fn navigation(&self, view: View) {
        if !self.interactive {
            return;
        }
        match view {
            View::Home => println!("Type a concept after `search`, or `help` for commands."),
            View::Compare => println!("[compare]"),
            View::History | View::Result => {}
        }
    }

    fn concept(&mut self, view: &ConceptView) {
        let diagram = self.pending_diagram.take();
        println!("\n{}", view.title);
        println!("{}", "=".repeat(view.title.chars().count().max(3)));
        render_markdown_block("Summary", &view.summary);
        for block in &view.levels {
            render_markdown_block(level_heading(block.level), &block.text);
        }

        if view.sections.structure {
            if let Some(code) = diagram {
                println!("\nStructure:");
                println!("```mermaid\n{code}\n```");
            }
        }
        if view.sections.timeline {
            println!("\nTimeline:");
            for (index, item) in view.timeline.iter().enumerate() {
                println!("  {}. {}: {}", index + 1, item.year, item.event);
            }
        }
        if view.sections.related {
            let chips: Vec<_> = view
                .related
                .iter()
                .enumerate()
                .map(|(index, concept)| format!("[{}] {concept}", index + 1))
                .collect();
            println!("\nRelated: {}", chips.join("  "));
        }
    }

    fn comparison(&self, view: &ComparisonView) {
        println!("\n{} vs {}", view.header_a, view.header_b);
        render_markdown_block("Summary", &view.summary);
        println!();
        for row in &view.rows {
            match row {
                TableRow::Values(row) => {
                    println!("- {}", row.criteria);
                    println!("    {}: {}", view.header_a, row.concept_a);
                    println!("    {}: {}", view.header_b, row.concept_b);
                }
                TableRow::Placeholder { message } => println!("  ({message})"),
            }
        }
    }

    fn history(&self, view: &HistoryView) {
        print_history_list("Recent searches", &view.recent);
        print_history_list("Favorites", &view.favorites);
    }
}

impl DiagramEngine for TerminalSurface {
    fn init(&mut self, element: &DiagramElement) {
        self.pending_diagram = Some(element.code.clone());
    }
}

impl Surface for TerminalSurface {
    fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Loading(true) => eprintln!("..."),
            UiEvent::Notice(notice) => self.notice(&notice),
            UiEvent::Navigation(activation) => self.navigation(activation.view),
            UiEvent::Concept(view) => self.concept(&view),
            UiEvent::Comparison(view) => self.comparison(&view),
            UiEvent::History(view) => self.history(&view),
            UiEvent::FavoriteButton(button) if self.interactive => {
                let mark = if button.favorited { "*" } else { "-" };
                println!("{mark} {} (`fav`)", button.label);
            }
            UiEvent::Section { section, visible } if self.interactive => {
                let state = if visible { "shown" } else { "hidden" };
                println!("{} section {state}", section.label());
            }
            _ => {}
        }
    }
}

fn print_history_list(title: &str, list: &HistoryList) {
    println!("\n{title}:");
    if let Some(placeholder) = &list.placeholder {
        println!("  {placeholder}");
        return;
    }
    for (index, query) in list.items.iter().enumerate() {
        println!("  {}. {query}", index + 1);
    }
}

fn print_options(options: &DisplayOptions) {
    let width = Section::ALL
        .iter()
        .map(|section| section.label().len())
        .max()
        .unwrap_or(7)
        .max("SECTION".len());
    println!("{:<width$}  {}", "SECTION", "SHOWN", width = width);
    println!("{:-<width$}  {}", "", "-----", width = width);
    for section in Section::ALL {
        println!(
            "{:<width$}  {}",
            section.label(),
            options.get(section),
            width = width
        );
    }
}

fn level_heading(level: Level) -> &'static str {
    match level {
        Level::Basic => "Basic",
        Level::Intermediate => "Intermediate",
        Level::Advanced => "Advanced",
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn markdown_skin() -> MadSkin {
    MadSkin::default()
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = markdown_skin();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}
