use clap::{Parser, Subcommand};
use photoshelf::imaging::RustBackend;
use photoshelf::metadata::ExifTool;
use photoshelf::pipeline::{self, Collaborators};
use photoshelf::process::IngestEvent;
use photoshelf::publish::{self, CommandTransport};
use photoshelf::store::RecordStore;
use photoshelf::{config, index, output, scan};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "photoshelf")]
#[command(about = "Incremental photo gallery publisher")]
#[command(long_about = "\
Incremental photo gallery publisher

Photos are grouped by the directory they live in. Each new photo gets a
metadata record and a bounded thumbnail; photos that already have a record
are never touched again. Originals and thumbnails are mirrored to a bucket and
an HTML index, newest first, links to them.

Layout:

  photos/                       # Source photos (never modified)
  └── 2023-05-01/               # Collection, usually a date
      ├── img1.JPG
      └── IMG2.jpg
  info/                         # One TOML record per processed photo
  └── 2023-05-01/
      ├── img1.jpg.toml
      └── img2.jpg.toml
  thumbnails/                   # Bounded previews, same names as originals
  docs/index.html               # Rendered gallery

Metadata is read with exiftool. Set RUST_LOG=debug for diagnostics.

Run 'photoshelf gen-config' to generate a documented photoshelf.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (missing file = defaults)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: ingest → publish → index (default)
    Build,
    /// Extract metadata and write thumbnails for new photos
    Ingest,
    /// Mirror photos and thumbnails to the bucket
    Publish,
    /// Render the HTML index from existing records
    Index,
    /// Validate config and list discovered photos without writing anything
    Check,
    /// Print a stock photoshelf.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let load_config = || config::load_config(&cli.config);

    match cli.command.unwrap_or(Command::Build) {
        Command::Build => {
            let config = load_config()?;
            init_thread_pool(&config.processing);
            let extractor = ExifTool::new(&config.metadata);
            let backend = RustBackend::new();
            let transport = CommandTransport::new(&config.remote);

            println!("==> Ingesting {}", config.paths.photos.display());
            let (tx, printer) = spawn_event_printer();
            let result = pipeline::run(
                &config,
                Collaborators {
                    extractor: &extractor,
                    backend: &backend,
                    transport: &transport,
                },
                Some(tx),
            );
            join_printer(printer);
            let summary = result?;

            print_lines(output::format_ingest_summary(&summary.ingest));
            println!("==> Published");
            print_lines(output::format_publish_output(&summary.publish));
            println!(
                "{}",
                output::format_build_complete(summary.indexed, &summary.output)
            );
        }
        Command::Ingest => {
            let config = load_config()?;
            init_thread_pool(&config.processing);
            let extractor = ExifTool::new(&config.metadata);
            let backend = RustBackend::new();

            let (tx, printer) = spawn_event_printer();
            let result = pipeline::ingest(&config, &extractor, &backend, Some(tx));
            join_printer(printer);
            let (_, report) = result?;
            print_lines(output::format_ingest_summary(&report));
        }
        Command::Publish => {
            let config = load_config()?;
            let transport = CommandTransport::new(&config.remote);
            let report = publish::publish(&transport, &config)?;
            print_lines(output::format_publish_output(&report));
        }
        Command::Index => {
            let config = load_config()?;
            let store = RecordStore::new(&config.paths.info);
            let entries = index::build_index(&store)?;
            let written = photoshelf::generate::generate(&entries, &config)?;
            print_lines(output::format_index_output(&entries, &written));
        }
        Command::Check => {
            let config = load_config()?;
            println!("==> Checking {}", config.paths.photos.display());
            let result = scan::scan(&config.paths.photos, &config.scan.extensions)?;
            output::print_scan_output(&result);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Print ingest events live from a dedicated thread.
fn spawn_event_printer() -> (Sender<IngestEvent>, JoinHandle<()>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            print_lines(output::format_ingest_event(&event));
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        tracing::warn!("progress printer panicked");
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}
