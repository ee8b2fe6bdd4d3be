use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use eframe::egui;
use tracing::info;

use needle_edit::app::{DiffApp, EditorApp, EditorOptions};
use needle_edit::config::{DiffConfig, EditorConfig, SelectionFallback};
use needle_edit::diff::{DiffMode, MatchArea, NeedleDiff};
use needle_edit::editor::NeedleEditor;
use needle_edit::loader::{self, Loader, Source};
use needle_edit::logging::setup_logging;
use needle_edit::needle::Candidate;

#[derive(Parser, Debug)]
#[command(
    name = "needle-edit",
    version,
    about = "Edit needle regions on a screenshot and compare needles against screenshots"
)]
struct Cli {
    /// Default log filter when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the region editor on a background image
    Edit(EditArgs),
    /// Show a needle next to a screenshot with a draggable divider
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Background image (path or URL)
    background: String,
    /// Needle JSON to edit (path or URL); a missing one starts empty
    #[arg(long)]
    needle: Option<String>,
    /// JSON list of selectable needles/screenshot entries
    #[arg(long)]
    candidates: Option<PathBuf>,
    /// URL the save form is posted to
    #[arg(long)]
    save_url: Option<String>,
    /// Shown in the commit message placeholder
    #[arg(long, default_value = "")]
    target: String,
    /// Smallest region width/height
    #[arg(long, default_value_t = 10)]
    min_size: i32,
    /// Region edits need an explicit selection instead of using the first region
    #[arg(long)]
    no_selection_fallback: bool,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Screenshot image (path or URL)
    screenshot: String,
    /// Needle image (path or URL)
    #[arg(long)]
    needle_image: Option<String>,
    /// Needle JSON with the areas (path or URL)
    #[arg(long)]
    needle: Option<String>,
    /// JSON list of match results, one per needle area
    #[arg(long)]
    matches: Option<PathBuf>,
    /// Divider position, fraction or percentage
    #[arg(long, default_value_t = 0.5)]
    divide: f64,
    /// Show the whole needle image left of the divider
    #[arg(long)]
    full: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Edit(args) => command_edit(args),
        Commands::Diff(args) => command_diff(args),
    }
}

fn command_edit(args: EditArgs) -> Result<()> {
    let config = EditorConfig {
        min_size: args.min_size.max(1),
        selection_fallback: if args.no_selection_fallback {
            SelectionFallback::None
        } else {
            SelectionFallback::FirstRegion
        },
        ..Default::default()
    };
    let candidates: Vec<Candidate> = match &args.candidates {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid candidate list {}", path.display()))?
        }
        None => Vec::new(),
    };
    let title = format!("needle-edit: {}", args.background);
    let options = EditorOptions {
        background: Source::parse(&args.background),
        needle: args.needle.as_deref().map(Source::parse),
        candidates,
        save_url: args.save_url,
        target: args.target,
    };
    info!(background = %options.background, "starting editor");

    run_window(&title, move |cc| {
        let ctx = cc.egui_ctx.clone();
        let loader = Loader::new().with_waker(move || ctx.request_repaint());
        Box::new(EditorApp::new(NeedleEditor::new(config), loader, options))
    })
}

fn command_diff(args: DiffArgs) -> Result<()> {
    let screenshot = loader::fetch_image(&Source::parse(&args.screenshot))
        .with_context(|| format!("Failed to load screenshot {}", args.screenshot))?;
    let needle_image = match &args.needle_image {
        Some(source) => Some(
            loader::fetch_image(&Source::parse(source))
                .with_context(|| format!("Failed to load needle image {}", source))?,
        ),
        None => None,
    };
    let areas = match &args.needle {
        Some(source) => {
            loader::fetch_needle(&Source::parse(source))
                .with_context(|| format!("Failed to load needle {}", source))?
                .area
        }
        None => Vec::new(),
    };
    let matches: Vec<MatchArea> = match &args.matches {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid match list {}", path.display()))?
        }
        None => Vec::new(),
    };
    let mode = if args.full { DiffMode::Full } else { DiffMode::AreaOnly };

    let config = DiffConfig {
        initial_divide: args.divide,
        ..Default::default()
    };
    let mut diff = NeedleDiff::new(screenshot.width(), screenshot.height(), config);
    diff.set_divide(args.divide);
    diff.set_screenshot(screenshot);
    diff.set_needle(needle_image, areas, matches, mode);
    info!(divide = diff.divide(), "starting diff viewer");

    let title = format!("needle-edit: {}", args.screenshot);
    run_window(&title, move |_cc| Box::new(DiffApp::new(diff)))
}

/// Open the native window. Failing to create it is fatal and reported in a dialog.
fn run_window<F>(title: &str, build: F) -> Result<()>
where
    F: FnOnce(&eframe::CreationContext<'_>) -> Box<dyn eframe::App> + 'static,
{
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(title),
        ..Default::default()
    };

    let result = eframe::run_native(title, options, Box::new(move |cc| Ok(build(cc))));
    if let Err(err) = result {
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title("needle-edit")
            .set_description(format!("Unable to open the editor window: {err}"))
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
        return Err(anyhow!("failed to run eframe: {err}"));
    }
    Ok(())
}
