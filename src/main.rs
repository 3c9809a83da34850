use anyhow::Result;
use clap::Parser;
use clothfetch::commands::{self, DEFAULT_CONCURRENCY, GroupOptions, config::Config};
use clothfetch::http::MAX_ATTEMPTS;
use clothfetch::overlay::OverlayCategory;
use std::path::PathBuf;
use std::time::Duration;

/// clothfetch - clothing asset downloader
///
/// Download clothing images by asset ID or for a whole group, optionally
/// composited with a shirt or pants template.
///
/// Examples:
///   clothfetch asset 1234567              # Save 1234567.png in the current directory
///   clothfetch asset 1234567 --overlay shirt
///   clothfetch group 98765 -o ./clothes   # Download every clothing item of a group
#[derive(Parser, Debug)]
#[command(author, version = env!("CLOTHFETCH_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output directory for downloaded images (also via CLOTHFETCH_OUTPUT)
    #[arg(
        long = "output",
        short = 'o',
        env = "CLOTHFETCH_OUTPUT",
        value_name = "PATH",
        default_value = ".",
        global = true
    )]
    pub output: PathBuf,

    /// Directory holding shirt_template.png and pants_template.png
    #[arg(
        long = "templates",
        env = "CLOTHFETCH_TEMPLATES",
        value_name = "PATH",
        default_value = "assets",
        global = true
    )]
    pub templates: PathBuf,

    /// Attempts per request before giving up
    #[arg(
        long = "retries",
        env = "CLOTHFETCH_RETRIES",
        value_name = "N",
        default_value_t = MAX_ATTEMPTS,
        global = true
    )]
    pub retries: u32,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Base URL serving the asset and catalog endpoints
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Enable debug logging
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download one clothing asset
    Asset(AssetArgs),

    /// Download every clothing asset sold by a group
    Group(GroupArgs),
}

#[derive(clap::Args, Debug)]
pub struct AssetArgs {
    /// Asset ID or a URL containing it
    #[arg(value_name = "ID-OR-URL")]
    pub asset: String,

    /// Composite the image with a template (shirt or pants)
    #[arg(long, value_name = "TYPE")]
    pub overlay: Option<OverlayCategory>,
}

#[derive(clap::Args, Debug)]
pub struct GroupArgs {
    /// Group ID
    #[arg(value_name = "GROUP-ID")]
    pub group: String,

    /// Composite every image with a template (shirt or pants)
    #[arg(long, value_name = "TYPE")]
    pub overlay: Option<OverlayCategory>,

    /// Number of assets downloaded at once
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Give up on a single asset after this many seconds
    #[arg(long = "asset-timeout", value_name = "SECS")]
    pub asset_timeout: Option<u64>,

    /// Maximum number of catalog pages to read
    #[arg(long = "max-pages", value_name = "N")]
    pub max_pages: Option<usize>,

    /// Only print the clothing IDs
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config::new(
            self.output.clone(),
            self.templates.clone(),
            self.api_url.as_deref(),
            self.retries,
            self.timeout,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = clothfetch::runtime::RealRuntime;
    let mut config = cli.config();

    match cli.command {
        Commands::Asset(args) => {
            commands::asset(runtime, config, &args.asset, args.overlay).await?
        }
        Commands::Group(args) => {
            if args.max_pages.is_some() {
                config.max_pages = args.max_pages;
            }
            let options = GroupOptions {
                overlay: args.overlay,
                concurrency: args.concurrency,
                asset_timeout: args.asset_timeout.map(Duration::from_secs),
                list_only: args.list,
            };
            commands::group(runtime, config, &args.group, options).await?
        }
    }
    Ok(())
}
