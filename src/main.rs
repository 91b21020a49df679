use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

use clap::{Parser, Subcommand};
use log::debug;
use receiptor::{
    analyzer::Analyzer,
    config::{HarvestOptionsBuilder, OpenAiConfig, PortalConfig},
    fetcher::Fetcher,
    lister::Lister,
    llm::OpenAiExtractor,
    pacing::UniformJitter,
    portal::PortalClient,
    query,
    store::Store,
};
use signal_hook::consts::{SIGINT, SIGTERM};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Lidl receipt harvesting CLI", long_about = None)]
struct Args {
    /// Directory for the id log, raw receipts and analyses
    #[arg(short = 'd', long, default_value = "out")]
    out_dir: PathBuf,
    /// Minimum delay in seconds between portal requests
    #[arg(long, default_value_t = 1)]
    min_delay: u64,
    /// Maximum delay in seconds between portal requests
    #[arg(long, default_value_t = 3)]
    max_delay: u64,
    /// Total number of concurrent analysis tasks
    #[arg(short = 'c', long, default_value_t = 3)]
    concurrent_analyses: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Enumerate receipt ids from the portal into the id log
    List,
    /// Download the raw receipt body for every id in the log
    Fetch,
    /// Extract structured purchase data from every stored receipt
    Analyze,
    /// Print aggregate spending statistics over the stored analyses
    Query,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let options = HarvestOptionsBuilder::default_builder()
        .out_dir(args.out_dir.clone())
        .min_delay_secs(args.min_delay)
        .max_delay_secs(args.max_delay)
        .concurrent_analyses(args.concurrent_analyses)
        .build()?;

    debug!("starting with {:#?}", options);

    let store = Store::new(&options.out_dir)?;
    let delay = UniformJitter::new(options.min_delay_secs, options.max_delay_secs);

    let should_terminate = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_terminate))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_terminate))?;

    match args.command {
        Command::List => {
            let config = PortalConfig::from_env()?;
            let portal = PortalClient::new(&config);
            Lister::new(&portal, &store, &delay, should_terminate)
                .run()
                .await?;
        }
        Command::Fetch => {
            let config = PortalConfig::from_env()?;
            let portal = PortalClient::new(&config);
            Fetcher::new(&portal, &store, &delay, should_terminate)
                .run()
                .await?;
        }
        Command::Analyze => {
            let config = OpenAiConfig::from_env()?;
            let extractor = OpenAiExtractor::new(&config);
            Analyzer::new(
                store,
                extractor,
                options.concurrent_analyses,
                should_terminate,
            )
            .run()
            .await?;
        }
        Command::Query => {
            query::run(&store)?;
        }
    }

    Ok(())
}
