use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use synth_playground::project::SnapshotStore;
use synth_playground::ui::app::PlaygroundApp;
use synth_playground::{AudioContext, Coordinator, FileStore, MemoryStore, PlaygroundConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "synth_playground", version, about = "Step sequencer playground")]
struct Args {
    /// Configuration file (defaults to <config_dir>/synth_playground/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the saved sequencers
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let config = PlaygroundConfig::load_or_default(args.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "synth playground starting");

    // Storage faults never stop the app: fall back to an in-memory store
    let storage_dir = args.storage_dir.or_else(|| config.storage_dir.clone());
    let store: Box<dyn SnapshotStore> = match storage_dir {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => match FileStore::default_location() {
            Ok(store) => {
                info!(path = %store.path().display(), "using durable storage");
                Box::new(store)
            }
            Err(e) => {
                error!(error = %e, "durable storage unavailable, changes will not be kept");
                Box::new(MemoryStore::new())
            }
        },
    };

    // Opened lazily on the first play or preview
    let audio = Arc::new(AudioContext::new(config.master_gain()));
    let coordinator = Coordinator::new(audio.clone(), store, &config);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_title("Synth Playground"),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "Synth Playground",
        native_options,
        Box::new(|_cc| Ok(Box::new(PlaygroundApp::new(coordinator, audio)))),
    ) {
        error!(error = %e, "UI terminated with an error");
    }
}
