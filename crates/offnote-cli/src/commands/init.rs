use std::path::PathBuf;

use offnote_core::SqliteStore;

use crate::app::AppContext;
use crate::cli::InitArgs;
use crate::config::{default_db_path, write_config, OffnoteConfig};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = ctx.config_path()?;
    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nRun:\n  offnote init --force\n\nto overwrite it.",
            config_path.display()
        ));
    }

    let db_path = match args.path.as_deref() {
        Some(path) => PathBuf::from(path),
        None => match ctx.cli_db() {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        },
    };

    let config = OffnoteConfig::new(db_path.clone(), args.origin.clone());
    write_config(&config_path, &config)?;
    SqliteStore::open(&db_path)?;

    if !ctx.quiet() {
        println!("Wrote config to {}", config_path.display());
        println!("Local database at {}", db_path.display());
    }
    Ok(())
}
