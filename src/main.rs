use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use drawover::capture::{CanvasTarget, CaptureScene, CaptureTarget, StaticImageTarget};
use drawover::prefs::{Preferences, HINT_DISMISSED};
use drawover::remote::HttpEditService;
use drawover::{AnnotationLayer, EditSession, InputEvent, SessionConfig, SubmitOutcome};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "drawover")]
#[command(about = "Replay a sketch over a page and let an edit service rewrite it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay input events over a document and submit one edit
    Submit {
        /// Markup of the initial document
        #[arg(long, value_name = "FILE")]
        html: PathBuf,
        /// JSON array of input events
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
        /// Screenshot of the rendered page; white when omitted
        #[arg(long, value_name = "FILE")]
        page: Option<PathBuf>,
        /// Override the configured edit endpoint
        #[arg(long)]
        endpoint: Option<String>,
        /// Where to write the resulting markup (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Replay input events and write the overlay as SVG (and optionally PNG)
    Render {
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
        /// Also rasterize the overlay over a page screenshot into this PNG
        #[arg(long, value_name = "FILE")]
        png: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        page: Option<PathBuf>,
    },
    /// Show or change the first-time hint preference
    Hint {
        #[arg(long, conflicts_with = "reset")]
        dismiss: bool,
        #[arg(long)]
        reset: bool,
    },
}

fn read_events(path: &Path) -> Result<Vec<InputEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read events from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid event script {}", path.display()))
}

fn canvas(page: Option<&Path>) -> Result<CanvasTarget> {
    match page {
        Some(p) => Ok(CanvasTarget::from_file(p)?),
        None => Ok(CanvasTarget::default()),
    }
}

async fn submit(
    config: SessionConfig,
    html: &Path,
    events: &Path,
    page: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let initial = std::fs::read_to_string(html)
        .with_context(|| format!("failed to read {}", html.display()))?;
    let service = HttpEditService::new(&config)?;
    info!("submitting edits to {}", service.endpoint());

    let builder = EditSession::builder(config, initial).overlay_target(canvas(page)?);
    let builder = match page {
        Some(p) => builder.page_target(StaticImageTarget::from_file(p)?),
        None => builder.page_target(CanvasTarget::default()),
    };
    let session = builder
        .on_state_change(|state| info!("session state: {:?}", state))
        .build(service);

    for event in read_events(events)? {
        session.dispatch(event);
    }

    match session.submit_edit().await? {
        SubmitOutcome::Applied => {}
        SubmitOutcome::NoOp => bail!("event script drew nothing; no edit submitted"),
        other => bail!("edit was not applied: {:?}", other),
    }

    let markup = session.current_markup();
    match out {
        Some(path) => std::fs::write(path, &markup)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", markup),
    }
    Ok(())
}

fn render(config: &SessionConfig, events: &Path, out: &Path, png: Option<&Path>, page: Option<&Path>) -> Result<()> {
    let mut layer = AnnotationLayer::new(config.stroke).with_backdrop(config.backdrop);
    for event in read_events(events)? {
        layer.enqueue(event);
    }
    let changed = layer.pump();
    info!("replayed events, {} changed the overlay", changed);

    let frame = layer.frame();
    std::fs::write(out, frame.to_svg(config.viewport.width, config.viewport.height))
        .with_context(|| format!("failed to write {}", out.display()))?;

    if let Some(png) = png {
        let cmds = frame.paint_commands();
        let img = canvas(page)?.rasterize(&CaptureScene {
            viewport: config.viewport,
            overlay: Some(&cmds),
        })?;
        img.save(png)
            .with_context(|| format!("failed to write {}", png.display()))?;
    }
    Ok(())
}

fn hint(config: &SessionConfig, dismiss: bool, reset: bool) -> Result<()> {
    let mut prefs = match &config.preferences_path {
        Some(path) => Preferences::load(path.clone())?,
        None => Preferences::in_memory(),
    };
    if dismiss || reset {
        prefs.set(HINT_DISMISSED, dismiss)?;
    }
    println!("show hint: {}", prefs.show_hint());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };

    match cli.command {
        Commands::Submit {
            html,
            events,
            page,
            endpoint,
            out,
        } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            config.validate()?;
            submit(config, &html, &events, page.as_deref(), out.as_deref()).await
        }
        Commands::Render { events, out, png, page } => {
            render(&config, &events, &out, png.as_deref(), page.as_deref())
        }
        Commands::Hint { dismiss, reset } => hint(&config, dismiss, reset),
    }
}
