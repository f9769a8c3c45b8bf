// Admin event streaming command

use anyhow::{bail, Context, Result};
use boxwatch_client::{Client, ClientError, Config, Event};
use tracing::{info, warn};

use crate::output::{print_table_header, print_table_row, OutputFormat};

const COLUMNS: [(&str, usize); 4] = [
    ("CREATED", 25),
    ("EVENT TYPE", 28),
    ("USER", 30),
    ("ITEM", 30),
];

pub async fn run(
    config: &Config,
    format: OutputFormat,
    limit: Option<u32>,
    start_time: Option<String>,
    max_events: Option<usize>,
) -> Result<()> {
    let start_time = start_time.unwrap_or_else(|| config.events.start_time.clone());
    if start_time.is_empty() {
        bail!("No start time: pass --start-time or set events.start_time");
    }
    let limit = limit.unwrap_or(config.events.event_limit);

    let client = Client::connect(&config.client)
        .await
        .context("Failed to create Box client")?
        .with_stream_config(config.events.stream_config());

    let mut stream = client.events().channel(limit, start_time);
    if format.is_text() {
        print_table_header(&COLUMNS);
    }

    let mut seen = 0usize;
    loop {
        let item = tokio::select! {
            item = stream.recv() => item,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping event stream");
                break;
            }
        };

        match item {
            None => break,
            Some(Ok(event)) => {
                print_event(&event, format)?;
                seen += 1;
                if max_events.is_some_and(|max| seen >= max) {
                    break;
                }
            }
            Some(Err(e @ ClientError::Seed { .. })) => {
                return Err(e).context("Failed to start event stream");
            }
            Some(Err(e)) => warn!(error = %e, "Event page failed, retrying"),
        }
    }

    stream.close().await;
    info!(events = seen, "Event stream closed");
    Ok(())
}

fn print_event(event: &Event, format: OutputFormat) -> Result<()> {
    if !format.is_text() {
        return format.print_record(event);
    }

    let user = event
        .created_by
        .as_ref()
        .map(|u| u.login.as_str())
        .unwrap_or("-");
    let item = event
        .source
        .as_ref()
        .map(|s| s.item_name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("-");

    print_table_row(&[
        (event.created_at.as_str(), COLUMNS[0].1),
        (event.event_type.as_str(), COLUMNS[1].1),
        (user, COLUMNS[2].1),
        (item, COLUMNS[3].1),
    ]);
    Ok(())
}
