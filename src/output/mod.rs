//! Output module for run summaries and records
//!
//! This module handles:
//! - Printing the summary of an index, build, update or backup run
//! - Grouping per-review failures by kind
//! - Printing single review records
//! - Recording local data statistics

pub mod stats;

pub use stats::{print_statistics, Statistics};

use crate::crawler::{BackupSummary, BuildReport, IndexSummary};
use crate::state::FailureReport;
use crate::storage::ReviewRecord;
use std::collections::BTreeMap;

/// Failure count per kind label, e.g. `HttpError{404}: 3`
pub fn failure_counts(failures: &FailureReport) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for failure in failures.values() {
        *counts.entry(failure.kind.label()).or_insert(0) += 1;
    }
    counts
}

fn print_failures(failures: &FailureReport, verbose: bool) {
    if failures.is_empty() {
        return;
    }

    println!("Failures ({}):", failures.len());
    for (label, count) in failure_counts(failures) {
        println!("  {}: {}", label, count);
    }
    if verbose {
        for (id, failure) in failures {
            if failure.isbns.is_empty() {
                println!("  - {}: {}", id, failure.kind);
            } else {
                println!("  - {} (ISBN {}): {}", id, failure.isbns.join(", "), failure.kind);
            }
        }
    }
}

pub fn print_index_summary(summary: &IndexSummary) {
    let report = &summary.report;
    println!("=== Index ===\n");
    println!("  ISBNs found: {}", report.isbn_total);
    println!("  Reviews found: {}", report.review_total);
    println!("  Invalid ISBNs skipped: {}", report.skipped_invalid);
    println!("  Reviews without ISBN: {}", report.unresolved);
    if !report.failed_pages.is_empty() {
        println!("  Failed results pages: {:?}", report.failed_pages);
    }
    if report.cancelled > 0 {
        println!("  Cancelled units: {}", report.cancelled);
    }
    println!(
        "  {} new entries, {} ISBNs in {}",
        summary.added,
        summary.total_isbns,
        summary.path.display()
    );
}

pub fn print_build_summary(report: &BuildReport, verbose: bool) {
    println!("=== Database ===\n");
    println!("  Reviews merged: {}", report.merged);
    if report.skipped > 0 {
        println!("  Already present: {}", report.skipped);
    }
    println!(
        "  Total: {} reviews under {} ISBNs",
        report.database.review_count(),
        report.database.isbn_count()
    );
    if report.cancelled() > 0 {
        println!("  Interrupted; {} reviews left for the next run", report.cancelled());
    }
    println!();
    print_failures(&report.failures, verbose);
}

pub fn print_backup_summary(summary: &BackupSummary, verbose: bool) {
    println!("=== Backup ===\n");
    println!("  Reviews saved: {}", summary.records);
    match &summary.path {
        Some(path) => println!("  File: {}", path.display()),
        None => println!("  No file written"),
    }
    if !summary.failed_pages.is_empty() {
        println!("  Failed results pages: {:?}", summary.failed_pages);
    }
    println!();
    print_failures(&summary.failures, verbose);
}

/// Prints every non-empty field of a review
pub fn print_record(record: &ReviewRecord) {
    println!("Review {}", record.review_id);

    let scalars = [
        ("Title", &record.title),
        ("Illustrator", &record.illustrator),
        ("Translator", &record.translator),
        ("Original language", &record.original_language),
        ("Pages", &record.pages),
        ("Publisher", &record.publisher),
        ("Genre", &record.genre),
        ("Series", &record.series),
        ("Year", &record.year),
        ("Price", &record.price),
        ("Binding", &record.binding),
        ("Reading age", &record.reading_age),
        ("Applications", &record.applications),
        ("Rating", &record.rating),
    ];

    if !record.authors.is_empty() {
        println!("  Authors: {}", record.authors.join("; "));
    }
    if !record.isbns.is_empty() {
        println!("  ISBN: {}", record.isbns.join(", "));
    }
    for (label, value) in scalars {
        if let Some(value) = value {
            println!("  {}: {}", label, value);
        }
    }
    if !record.keywords.is_empty() {
        println!("  Keywords: {}", record.keywords.join(", "));
    }
    if record.laureate {
        println!("  Heinrich-Wolgast prize: yes");
    }

    for (label, paragraphs) in [
        ("Content", &record.content),
        ("Review", &record.text),
        ("Remarks", &record.remarks),
    ] {
        if paragraphs.is_empty() {
            continue;
        }
        println!("\n  {}:", label);
        for paragraph in paragraphs {
            println!("    {}", paragraph);
        }
    }
    println!();
}
