use clap::Parser;
use datamap_editor::{ConfigOverrides, EditorConfig};
use std::path::PathBuf;

/// Visual editor for an entity's DataMap diagram.
#[derive(Debug, Parser)]
#[command(name = "datamap-editor", version, about)]
struct Args {
    /// Entity whose diagram is edited
    #[arg(long, short = 'e')]
    entity: Option<String>,

    /// Base URL of the remote store
    #[arg(long)]
    base_url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Keep the diagram in memory instead of the remote store
    #[arg(long)]
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = EditorConfig::load(args.config.as_deref())?;
    config.apply_overrides(ConfigOverrides {
        entity_id: args.entity,
        base_url: args.base_url,
        offline: args.offline,
    });
    config.validate()?;

    datamap_editor::run_app(config)
}
