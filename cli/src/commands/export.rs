use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use weightsync_core::db::Database;
use weightsync_core::export::write_csv;

use crate::config::Config;

pub(crate) fn cmd_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let db = Database::open(&config.db_path)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let n = write_csv(&db, BufWriter::new(file))?;
            eprintln!("Exported {n} measurements to {}", path.display());
        }
        None => {
            write_csv(&db, io::stdout().lock())?;
        }
    }

    db.close()?;
    Ok(())
}
