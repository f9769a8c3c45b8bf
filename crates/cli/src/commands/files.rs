// File lookup command

use anyhow::{Context, Result};
use boxwatch_client::{Client, Config};
use serde::Serialize;

use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct FileHash<'a> {
    id: &'a str,
    sha1: String,
}

pub async fn run(config: &Config, format: OutputFormat, file_id: &str) -> Result<()> {
    let client = Client::connect(&config.client)
        .await
        .context("Failed to create Box client")?;

    let sha1 = client
        .files()
        .get_file_hash(file_id)
        .await
        .with_context(|| format!("Failed to fetch file {}", file_id))?;

    if format.is_text() {
        println!("{}", sha1);
        return Ok(());
    }
    format.print_value(&FileHash { id: file_id, sha1 })
}
