//! vbench CLI
//!
//! ```bash
//! vbench run --datasets lerobot/pusht_image --codecs libx264 --crf 0 20 none
//! vbench inspect --dataset lerobot/pusht_image
//! vbench merge --inputs a.csv b.csv --output all.csv
//! vbench backends
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use vbench_cli::cli::{commands, Cli, Commands};
use vbench_cli::utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format);

    let config_file = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run(args) => {
            info!("Executing run command");
            commands::run(config_file, args).await
        }
        Commands::Inspect(args) => commands::inspect(config_file, args),
        Commands::Merge(args) => commands::merge(args),
        Commands::Backends(args) => commands::backends(config_file, args),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
