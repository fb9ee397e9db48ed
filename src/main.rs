use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use multi_pad::app::controllers::tabs::SWITCH_DEBOUNCE;
use multi_pad::app::services::loader::TextCodec;
use multi_pad::app::{App, AppSettings, AutoAnswer, BasicCodec, FsLoader, SaveChoice};

/// Headless driver: opens the files given on the command line in one window,
/// waits for the loads and prints the resulting tabs.
fn main() {
    // Set RUST_LOG=multi_pad=debug for transfer and highlighter detail
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = AppSettings::load();
    let codec: Arc<dyn TextCodec> = Arc::new(BasicCodec);
    let loader = FsLoader::new(Arc::clone(&codec), settings.max_file_size_bytes());
    let mut app = App::new(settings, loader, codec, Box::new(AutoAnswer(SaveChoice::Cancel)));

    let window = app.create_window(true);
    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let started = app.open_files(window, &paths);
    info!(files = started, "MultiPad started");

    while app.is_loading() {
        app.process_events(Instant::now());
        thread::sleep(Duration::from_millis(10));
    }
    app.process_events(Instant::now() + SWITCH_DEBOUNCE);

    if let Some(w) = app.window(window) {
        println!("{}", w.title());
        for (index, doc) in w.tabs().records().iter().enumerate() {
            let marker = if w.tabs().active_index() == Some(index) { '>' } else { ' ' };
            println!(
                "{} {:>2}  {:<32} {:>8} bytes  {:<10} {}{}",
                marker,
                index,
                doc.path().map_or_else(|| "Untitled".to_string(), |p| p.display().to_string()),
                doc.file_size_bytes,
                doc.encoding,
                doc.program_language.unwrap_or("-"),
                if doc.read_only { "  (read-only)" } else { "" },
            );
        }
        if let Some(banner) = w.banner() {
            eprintln!("{}{}", banner.title, banner.detail.as_deref().map(|d| format!(" {}", d)).unwrap_or_default());
        }
    }

    if app.quit()
        && let Err(e) = app.save_settings()
    {
        warn!(error = %e, "failed to save settings");
    }
}
