use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use goldratio::core::Pipeline;
use goldratio::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PipelineArg {
    /// Stock priced in local currency, converted through USD/TRY
    Stock,
    /// Crypto asset priced in USD
    Crypto,
}

impl From<PipelineArg> for Pipeline {
    fn from(arg: PipelineArg) -> Pipeline {
        match arg {
            PipelineArg::Stock => Pipeline::Stock,
            PipelineArg::Crypto => Pipeline::Crypto,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP API
    Serve {
        /// Address to listen on, overrides the configured one
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the gold ratio series for a ticker as JSON
    Ratio {
        #[arg(value_enum)]
        pipeline: PipelineArg,
        ticker: String,
        /// First date of the series, YYYY-MM-DD
        start_date: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(Commands::Serve { bind }) => goldratio::serve(config_path, bind.as_deref()).await,
        Some(Commands::Ratio {
            pipeline,
            ticker,
            start_date,
        }) => goldratio::ratio_json(pipeline.into(), &ticker, &start_date, config_path)
            .await
            .map(|json| println!("{json}")),
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = goldratio::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
server:
  bind: "127.0.0.1:5000"

providers:
  yahoo:
    base_url: "https://query1.finance.yahoo.com"

ratio:
  gram_in_ounce: 31.1035
  gold_symbol: "GC=F"
  fx_symbol: "USDTRY=X"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
