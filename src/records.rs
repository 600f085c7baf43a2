//! `cidx records`: preview the records a sync would upload.
//!
//! Runs extraction only. No credentials are needed and nothing is sent
//! to the remote index.

use anyhow::Result;

use crate::config::Config;
use crate::extract::{extract_records, ExtractOptions, Extraction};

/// Extracts records from the configured content root.
pub fn collect_records(config: &Config) -> Result<Extraction> {
    let options = ExtractOptions::from_config(&config.content);
    Ok(extract_records(&config.content.root, &options)?)
}

/// Prints the extracted records, as a listing or as JSON with `json`.
pub fn run_records(config: &Config, json: bool) -> Result<()> {
    let extraction = collect_records(config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction.records)?);
        return Ok(());
    }

    if extraction.records.is_empty() {
        println!("No records found under {}.", config.content.root.display());
    }
    for record in &extraction.records {
        println!("{}  {}", record.id, record.title);
        println!("    permalink: {}", record.permalink);
        if !record.categories.is_empty() {
            println!("    categories: {}", record.categories.join(", "));
        }
        println!("    reading time: {} min", record.estimated_reading_minutes);
    }
    for failure in &extraction.failures {
        println!("skipped {}: {}", failure.path.display(), failure.error);
    }
    println!(
        "{} record(s), {} skipped",
        extraction.records.len(),
        extraction.failures.len()
    );
    Ok(())
}
