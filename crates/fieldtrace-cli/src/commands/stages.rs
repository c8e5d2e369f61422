use anyhow::Result;
use clap::Args;
use fieldtrace_core::stages::{definitions, ArtifactKind};

#[derive(Args)]
pub struct StagesArgs {
    /// Also list each stage's parameters with default and range
    #[arg(short, long)]
    pub params: bool,
}

pub fn run(args: &StagesArgs) -> Result<()> {
    println!(
        "{:<3} {:<18} {:<15} {}",
        "#", "Stage", "Operation", "Artifact"
    );
    for def in definitions() {
        let artifact = match (def.kind, def.preview) {
            (ArtifactKind::Document, Some(preview)) => format!("{} (+ {preview})", def.artifact),
            _ => def.artifact.to_string(),
        };
        println!(
            "{:<3} {:<18} {:<15} {}",
            def.id.order() + 1,
            def.id,
            def.operation,
            artifact
        );
        if args.params {
            for p in def.params {
                println!(
                    "      {:<16} default {:<8} range [{}, {}]",
                    p.name,
                    p.format(p.default),
                    p.format(p.min),
                    p.format(p.max)
                );
            }
        }
    }
    Ok(())
}
