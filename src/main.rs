use clap::Parser;
use pagepipe::permalink::{DEFAULT_PATTERN, PermalinkEngine};
use pagepipe::pipeline::{self, PipelineOptions};
use pagepipe::store::FsStore;
use pagepipe::transform::{CommandTransform, Passthrough, Transform};
use pagepipe::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pagepipe")]
#[command(about = "Publish front-matter markup files through an external renderer")]
#[command(long_about = "\
Publish front-matter markup files through an external renderer

Every file under the source directory is parsed for a front matter header
(YAML ---, TOML +++ or JSON {), piped through the processor command, and
written to the destination at a path derived from its permalink pattern.
Each directory also gets a dated link listing, newest first.

Content structure:

  content/
  ├── _index.md                    # Root page → public/index.<ext>
  ├── about.md                     # Root page → public/about/...
  └── posts/
      ├── 2024-01-01-hello.md      # → public/2024/01/Hello/...
      └── 2024-02-10-second.md

Configuration (config.toml, Hugo layout):

  uglyURLs = true                  # public/2024/01/Hello.md, not .../Hello/index.md
  buildDrafts = false
  [permalinks]
  posts = \"/:year/:month/:title/\"

Pattern attributes: year month monthname day weekday weekdayname yearday
section title slug filename")]
#[command(version)]
struct Cli {
    /// Extension of the written files
    #[arg(long, default_value = "md")]
    ext: String,

    /// Processor command line; content is piped through it (empty = copy as is)
    #[arg(long, default_value = "")]
    pipe: String,

    /// Content directory
    #[arg(long, default_value = "content")]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "public")]
    destination: PathBuf,

    /// Site configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Write flat <name>.<ext> files regardless of config
    #[arg(long)]
    ugly_urls: bool,

    /// Publish drafts regardless of config
    #[arg(long)]
    build_drafts: bool,

    /// Skip writing per-directory listings
    #[arg(long)]
    no_section_list: bool,

    /// Section whose listing is also written as the root index (empty = none)
    #[arg(long, default_value = "posts")]
    section_on_root: String,

    /// Maximum parallel processor invocations (default: CPU cores)
    #[arg(long)]
    jobs: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    for key in ["uglyURLs", "buildDrafts"] {
        if !cfg.is_set(key) {
            tracing::info!("config: no {key} set, using default: false");
        }
    }
    if !cfg.is_set("permalinks") {
        tracing::info!("config: no permalinks set, using default: {DEFAULT_PATTERN}");
    }

    let engine = PermalinkEngine::default();
    let permalinks = cfg.permalinks();
    for (section, pattern) in permalinks.overrides() {
        if let Err(e) = engine.check(pattern) {
            tracing::warn!(section, %pattern, error = %e, "pages in this section will be dropped");
        }
    }

    let options = PipelineOptions {
        source: cli.source,
        destination: cli.destination,
        ext: cli.ext,
        ugly_urls: cli.ugly_urls || cfg.get_bool("uglyURLs"),
        build_drafts: cli.build_drafts || cfg.get_bool("buildDrafts"),
        section_lists: !cli.no_section_list,
        section_on_root: Some(cli.section_on_root).filter(|s| !s.is_empty()),
        permalinks,
        jobs: cli.jobs.or(cfg.processing().max_processes),
    };

    let command = CommandTransform::from_command_line(&cli.pipe);
    let transform: &dyn Transform = match &command {
        Some(command) => command,
        None => &Passthrough,
    };
    println!(
        "==> Publishing {} → {} with {}",
        options.source.display(),
        options.destination.display(),
        command.as_ref().map_or("no processor", |c| c.program())
    );

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });
    let result = pipeline::run(&options, &engine, transform, &FsStore, Some(tx));
    printer.join().ok();

    let summary = result?;
    output::print_summary(&summary);
    Ok(())
}
