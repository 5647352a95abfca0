//! Bronze snapshots of list resources
//!
//! Each resource is paged through and written as JSONL under
//! `<output_dir>/payday/<resource>/snapshot_<yyyymmdd_HHMMSS>.jsonl`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::*;
use log::{error, info};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::api::constants::paging;
use crate::api::{PageOptions, RequestExecutor, fetch_all_pages};
use crate::config::Config;

use super::raw::parse_query_pair;

pub const SOURCE_NAME: &str = "payday";

#[derive(Args)]
pub struct FetchCommands {
    /// Resources to fetch (e.g. customers invoices)
    #[arg(required = true)]
    pub resources: Vec<String>,

    /// Items requested per page
    #[arg(long, default_value_t = paging::DEFAULT_PER_PAGE)]
    pub per_page: u32,

    /// Stop after this many pages
    #[arg(long, default_value_t = paging::MAX_PAGES)]
    pub max_pages: u32,

    /// Extra query parameter as key=value sent with every page, repeatable
    #[arg(short, long)]
    pub query: Vec<String>,

    /// Root directory for snapshots
    #[arg(short, long, default_value = "data/bronze")]
    pub output_dir: PathBuf,
}

/// Returns false when any resource failed
pub async fn handle_fetch_command(args: FetchCommands, config: &Config, profile: Option<&str>) -> Result<bool> {
    let query = args
        .query
        .iter()
        .map(|pair| parse_query_pair(pair))
        .collect::<Result<Vec<_>>>()?;
    let resolved = config.resolve(profile)?;
    let executor = RequestExecutor::connect(&resolved, config.resilience.to_config())?;
    let options = PageOptions {
        per_page: args.per_page,
        max_pages: args.max_pages,
    };

    let failures = fetch_resources(
        &executor,
        config,
        &args.resources,
        &query,
        options,
        &args.output_dir,
        Utc::now(),
    )
    .await;

    if failures > 0 {
        println!("\n{} of {} resources failed", failures, args.resources.len());
    }
    Ok(failures == 0)
}

/// Page through each resource and snapshot it. A failing resource is
/// reported and skipped; the number of failures is returned.
pub async fn fetch_resources(
    executor: &RequestExecutor,
    config: &Config,
    resources: &[String],
    query: &[(String, String)],
    options: PageOptions,
    output_dir: &Path,
    started: DateTime<Utc>,
) -> usize {
    let mut failures = 0;
    for resource in resources {
        let path = config.resource_path(resource);
        println!("🔄 {} {}", "Fetching".dimmed(), path.cyan());

        let paged = match fetch_all_pages(executor, &path, query, options).await {
            Ok(paged) => paged,
            Err(e) => {
                error!("Fetching {} failed: {}", resource, e);
                println!("{} {}: {}", "✗".red(), resource, e);
                failures += 1;
                continue;
            }
        };

        if let Some(e) = &paged.partial_error {
            println!(
                "{} {}: stopped after page {}: {}",
                "⚠".yellow(),
                resource,
                paged.pages_fetched,
                e
            );
        }

        if paged.items.is_empty() {
            println!("{} {}: no records", "○".dimmed(), resource);
            continue;
        }

        let file = match write_snapshot(output_dir, resource, &paged.items, started) {
            Ok(file) => file,
            Err(e) => {
                error!("Writing {} snapshot failed: {:#}", resource, e);
                println!("{} {}: {:#}", "✗".red(), resource, e);
                failures += 1;
                continue;
            }
        };
        info!("Wrote {} {} records to {:?}", paged.items.len(), resource, file);
        println!(
            "{} {}: {} rows in {} pages → {}",
            "✓".green(),
            resource,
            paged.items.len(),
            paged.pages_fetched,
            file.display()
        );
    }
    failures
}

/// Write one JSONL snapshot and return its path
pub fn write_snapshot(root: &Path, resource: &str, items: &[Value], taken_at: DateTime<Utc>) -> Result<PathBuf> {
    let dir = root.join(SOURCE_NAME).join(resource);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create snapshot directory: {:?}", dir))?;

    let path = dir.join(format!("snapshot_{}.jsonl", taken_at.format("%Y%m%d_%H%M%S")));
    let file = File::create(&path).with_context(|| format!("Failed to create snapshot file: {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for item in items {
        let record = bronze_record(item.clone(), resource, Utc::now());
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(path)
}

/// Tag an item with ingestion metadata. Non-object items land under `value`.
fn bronze_record(item: Value, resource: &str, ingested_at: DateTime<Utc>) -> Value {
    let mut record = match item {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("value".to_string(), other);
            object
        }
    };
    record.insert("_ingested_at_utc".to_string(), Value::String(ingested_at.to_rfc3339()));
    record.insert("_source_".to_string(), Value::String(SOURCE_NAME.to_string()));
    record.insert("_resource_".to_string(), Value::String(resource.to_string()));
    Value::Object(record)
}
