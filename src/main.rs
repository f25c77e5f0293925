use clap::{Parser, Subcommand};
use simple_srcset::config::{self, DEFAULT_CONFIG_FILE};
use simple_srcset::imaging::RustBackend;
use simple_srcset::markup::SrcsetArgs;
use simple_srcset::output;
use simple_srcset::pipeline::Pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-srcset")]
#[command(about = "Responsive image derivatives and srcset markup for static sites")]
#[command(long_about = "\
Responsive image derivatives and srcset markup for static sites

Images referenced from your pages are resized to every configured breakpoint
width, cached in a staging directory, and referenced through srcset/sizes.

Project layout (defaults):

  srcset.toml                  # Optional config (see gen-config)
  src/                         # Source images, referenced as /img/photo.jpg
  │   └── img/photo.jpg
  .simple-srcset-temp/         # Staged derivatives, reused across builds
  │   └── img/photo_3f9c0a1b2c3d4e5f.jpg
  dist/                        # Rendered site; pages rewritten in place
      ├── index.html
      └── img/photo_3f9c0a1b2c3d4e5f.jpg

Typical use after your site generator has written dist/:

  simple-srcset build          # transform pages, then finalize

Run 'simple-srcset gen-config' to generate a documented srcset.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log every derivative decision
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the <img> tag for one image, generating its derivatives
    Srcset {
        /// Image reference, relative to input_dir
        image: String,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        class: Option<String>,
        /// Base width (defaults to fallback_width)
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// Value of the sizes attribute (defaults to 100vw)
        #[arg(long)]
        sizes: Option<String>,
        /// Crop position for boxed derivatives (e.g. attention, north)
        #[arg(long)]
        crop: Option<String>,
    },
    /// Print the sizes planned for a base box, as JSON
    Plan {
        width: u32,
        #[arg(long)]
        height: Option<u32>,
    },
    /// Rewrite matched images in every .html file under output_dir
    Transform,
    /// Copy staged derivatives into output_dir
    Finalize,
    /// Transform every page, then finalize
    Build,
    /// Print a stock srcset.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let site_config = config::load_config(&cli.config)?;
    init_thread_pool(&site_config.processing);
    let pipeline = Pipeline::new(site_config, RustBackend::new())?;

    match cli.command {
        Command::Srcset {
            image,
            alt,
            class,
            width,
            height,
            sizes,
            crop,
        } => {
            let rendered = pipeline.srcset(&SrcsetArgs {
                image: Some(image),
                alt,
                class,
                width,
                height,
                sizes,
                crop,
            });
            println!("{}", rendered.html);
            eprintln!("{}", output::format_cache_summary(&rendered.stats));
        }
        Command::Plan { width, height } => {
            let plan = pipeline.plan(width, height);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Transform => {
            let report = pipeline.transform_site()?;
            output::print_transform_output(&report);
            println!("{}", output::format_cache_summary(&report.stats));
        }
        Command::Finalize => {
            let report = pipeline.finalize();
            output::print_finalize_output(report.as_ref(), &pipeline.config().output_dir);
        }
        Command::Build => {
            let output_dir = &pipeline.config().output_dir;

            println!("==> Transforming pages in {}", output_dir.display());
            let transformed = pipeline.transform_site();
            if let Ok(report) = &transformed {
                output::print_transform_output(report);
            }

            // Rewritten pages reference staged files: finalize even if the walk failed
            println!("==> Finalizing");
            let finalized = pipeline.finalize();
            output::print_finalize_output(finalized.as_ref(), output_dir);

            let report = transformed?;
            println!("{}", output::format_cache_summary(&report.stats));
            println!("==> Build complete: {}", output_dir.display());
        }
        // Printed before the config is loaded
        Command::GenConfig => {}
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
