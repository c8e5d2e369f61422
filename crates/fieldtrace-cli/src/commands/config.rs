use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use fieldtrace_core::config::WorkflowConfig;
use fieldtrace_core::stages::definitions;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a default WorkflowConfig as TOML, with every stage
/// parameter listed at its default.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let mut config = WorkflowConfig::default();
    for def in definitions() {
        if def.params.is_empty() {
            continue;
        }
        let values = config.parameters.entry(def.id.to_string()).or_default();
        for p in def.params {
            values.insert(p.name.to_string(), p.default);
        }
    }
    let toml_str = config.to_toml()?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
