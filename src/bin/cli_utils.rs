use anyhow::{bail, Context, Result};
use mimedb::{DatabaseConfig, MimeDatabase};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where the database comes from, as given on the command line.
pub struct Sources {
    pub caches: Vec<PathBuf>,
    pub packages: Vec<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Sources {
    /// Configuration file contents (if any) extended by the command-line
    /// caches and packages.
    pub fn config(&self) -> Result<DatabaseConfig> {
        let mut config = match &self.config {
            Some(path) => DatabaseConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => DatabaseConfig::default(),
        };
        config.cache_files.extend(self.caches.iter().cloned());
        config.packages.extend(self.packages.iter().cloned());

        if config.cache_files.is_empty() && config.packages.is_empty() {
            bail!("no type data given; use --cache, --package or --config");
        }
        Ok(config)
    }

    pub fn open_database(&self) -> Result<MimeDatabase> {
        let config = self.config()?;
        Ok(MimeDatabase::from_config(&config))
    }
}

/// Installs a stderr subscriber filtered by `MIMEDB_LOG`, then `RUST_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("MIMEDB_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints one line per item, or the list as JSON.
pub fn print_lines(items: &[String], json: bool) -> Result<()> {
    if json {
        print_json(items)
    } else {
        for item in items {
            println!("{}", item);
        }
        Ok(())
    }
}
