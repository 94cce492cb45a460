//! Dump command implementation.

use super::scan_segments;
use logkv_core::Record;
use serde::Serialize;
use std::path::Path;

/// One record with its location.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Segment id.
    pub segment: u64,
    /// One-based position within the segment's well-formed records.
    pub index: usize,
    /// The record as stored.
    pub record: Record,
}

/// Collects records in replay order.
pub fn collect(
    path: &Path,
    segment: Option<u64>,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    for report in scan_segments(path)? {
        if segment.is_some_and(|id| id != report.id.as_u64()) {
            continue;
        }

        let scan = report.scan?;
        for (i, record) in scan.records.into_iter().enumerate() {
            if records.len() >= max_records {
                return Ok(records);
            }
            records.push(RecordInfo {
                segment: report.id.as_u64(),
                index: i + 1,
                record,
            });
        }
    }

    Ok(records)
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    segment: Option<u64>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = collect(path, segment, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

fn print_text_output(records: &[RecordInfo]) {
    println!("Log Records");
    println!("===========");
    println!();

    if records.is_empty() {
        println!("No records found.");
        return;
    }

    for info in records {
        let record = &info.record;
        match &record.value {
            Some(value) => {
                let ttl = value.ttl.map(|t| format!(" ttl={t}")).unwrap_or_default();
                println!(
                    "[{}:{}] {} {} = {} ({}, v{}{})",
                    info.segment,
                    info.index,
                    record.operation.as_str(),
                    record.key,
                    value.payload,
                    value.payload.kind(),
                    value.version,
                    ttl
                );
            }
            None => println!(
                "[{}:{}] {} {}",
                info.segment,
                info.index,
                record.operation.as_str(),
                record.key
            ),
        }
    }

    println!();
    println!("Total: {} records", records.len());
}
