use clap::{Parser, Subcommand};
use sitewright::beautify::WhitespaceBeautifier;
use sitewright::build::{self, BuildOptions, Collaborators};
use sitewright::bundler::CommandBundler;
use sitewright::config::{self, Project};
use sitewright::enumerate::CommandEnumerator;
use sitewright::images::RustCodec;
use sitewright::{logging, output};
use std::path::PathBuf;

/// Shared flags for commands that generate images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the image cache and force re-encoding of every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "sitewright")]
#[command(version)]
#[command(about = "Multi-pass static site build pipeline")]
#[command(long_about = "\
Multi-pass static site build pipeline

Compiles the project in three passes (static-render, asset, and
partial-hydration when the site uses it), reconciles their outputs into one
file tree, and generates derived images through a persistent cache.

Project layout:

  my-site/
  ├── sitewright.toml        # Config (optional, stock defaults otherwise)
  ├── public/                # Copied verbatim into the output root
  ├── src/                   # Sources, compiled by the configured bundler
  ├── .sitewright-temp/      # Intermediate artifacts (ssg.mjs, images.json)
  ├── .sitewright-cache/     # Image cache (cache.json + store files)
  └── dist/                  # Output, recreated on every build

Run 'sitewright gen-config' to print a documented sitewright.toml.")]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Diagnostic log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: passes → reconcile → images
    Build(CacheArgs),
    /// Generate only the images recorded by the last build
    Images(CacheArgs),
    /// Validate the config and show the resolved settings
    Check,
    /// Print a stock sitewright.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(logging::LoggingConfig::with_level(logging::parse_level(
        &cli.log_level,
    )));

    match cli.command {
        Command::Build(cache_args) => {
            let project = Project::load(&cli.root)?;
            init_thread_pool(&project.config.processing);

            let bundler = CommandBundler::new(project.config.bundler.clone());
            let enumerator = CommandEnumerator::new(project.config.enumerate.clone());
            let collaborators = Collaborators {
                bundler: &bundler,
                enumerator: &enumerator,
                codec: &RustCodec::new(),
                beautifier: &WhitespaceBeautifier,
            };

            println!("==> Building {}", project.root.display());
            let report = build::build(
                &project,
                collaborators,
                BuildOptions {
                    use_cache: !cache_args.no_cache,
                },
            )?;
            output::print_build_report(&report, &project.config.out);
            println!("==> Build complete: {}", project.out_dir().display());
        }
        Command::Images(cache_args) => {
            let project = Project::load(&cli.root)?;
            init_thread_pool(&project.config.processing);
            let report = build::build_images(&project, &RustCodec::new(), !cache_args.no_cache)?;
            output::print_image_report(&report, &project.config.out);
        }
        Command::Check => {
            let project = Project::load(&cli.root)?;
            println!("==> Checking {}", project.root.display());
            println!("Output:    {}", project.out_dir().display());
            println!("Public:    {}", project.public_dir().display());
            println!("Temp:      {}", project.temp_dir().display());
            println!("Cache:     {}", project.cache_dir().display());
            println!("Bundle:    {}", project.config.bundle_css_name());
            println!("Partial:   {}", project.config.partial_js_name());
            println!(
                "Workers:   {}",
                config::effective_threads(&project.config.processing)
            );
            for entry in &project.entries {
                println!(
                    "Entry:     {} → {} (include {:?}, exclude {:?})",
                    entry.name,
                    entry.input.display(),
                    entry.include,
                    entry.exclude
                );
            }
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
