//! Command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::adapters::{DecoderRegistry, SweepFileConfig};
use crate::app::inspect_interactor::InspectRequest;
use crate::app::{AppContainer, DefaultAppContainer};
use crate::cli::args::{BackendsArgs, InspectArgs, MergeArgs, RunArgs};
use crate::config_initialization::{initialize_configuration_hierarchy, SweepConfig, SweepOverrides};
use crate::output::{ResultTable, TableWriter};

/// Assemble the configuration: file and environment below `cli`
fn load_config(config_file: Option<&Path>, cli: SweepOverrides) -> Result<Arc<SweepConfig>> {
    let file = SweepFileConfig::discover(config_file).context("Failed to load configuration file")?;
    let env = SweepOverrides::from_env(|key| std::env::var(key).ok())
        .context("Invalid environment configuration")?;
    initialize_configuration_hierarchy(file, env, cli).context("Invalid sweep configuration")
}

/// Execute the run command
pub async fn run(config_file: Option<&Path>, args: RunArgs) -> Result<()> {
    let config = load_config(config_file, args.to_overrides())?;
    info!(
        "Output directory: {}, data root: {}",
        config.output_dir.display(),
        config.data_root.display()
    );

    let container = DefaultAppContainer::new(config);
    let report = container
        .sweep_interactor()
        .execute()
        .await
        .context("Sweep aborted")?;

    print!("{}", report.render());
    Ok(())
}

/// Execute the inspect command
pub fn inspect(config_file: Option<&Path>, args: InspectArgs) -> Result<()> {
    let overrides = SweepOverrides {
        data_root: args.data_root.clone(),
        ..SweepOverrides::default()
    };
    let config = load_config(config_file, overrides)?;

    let container = DefaultAppContainer::new(config);
    let response = container
        .inspect_interactor()
        .execute(&InspectRequest {
            dataset_id: args.dataset.clone(),
            json: args.json,
        })
        .with_context(|| format!("Failed to inspect dataset {}", args.dataset))?;

    println!("{}", response.summary.trim_end());
    Ok(())
}

/// Execute the merge command
pub fn merge(args: MergeArgs) -> Result<()> {
    let tables = args
        .inputs
        .iter()
        .map(|path| {
            TableWriter::read(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = ResultTable::concat(&tables);
    TableWriter::write(&merged, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Merged {} tables ({} rows, {} columns) into {}",
        tables.len(),
        merged.len(),
        merged.columns.len(),
        args.output.display()
    );
    Ok(())
}

/// Execute the backends command
pub fn backends(config_file: Option<&Path>, args: BackendsArgs) -> Result<()> {
    let overrides = SweepOverrides {
        ffmpeg_bin: args.ffmpeg_bin.clone(),
        ..SweepOverrides::default()
    };
    let config = load_config(config_file, overrides)?;
    let registry = DecoderRegistry::with_defaults(&config.ffmpeg_bin);
    let capabilities = registry.capabilities();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&capabilities).context("Failed to serialize backends")?
        );
        return Ok(());
    }

    println!("{:<16} {:<11} {:<13}", "BACKEND", "EXACT_SEEK", "SPARSE_DECODE");
    for (name, caps) in &capabilities {
        println!("{:<16} {:<11} {:<13}", name, caps.exact_seek, caps.sparse_decode);
    }
    Ok(())
}
