//! Human-readable and JSON rendering of command results.

use anyhow::Result;
use console::{style, Emoji};
use serde::Serialize;
use vsnap_repo::{CheckoutPlan, CheckoutResult, CommitResult, FileEntry, LogEntry, RepoStats};

static CHECK: Emoji<'_, '_> = Emoji("✔ ", "");
static WARN_ICON: Emoji<'_, '_> = Emoji("⚠ ", "warning: ");

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn commit(result: &CommitResult) {
    println!("{}{}", CHECK, style(&result.summary).green());
    if result.new_blobs > 0 {
        println!("  {}", style(format!("{} new blob(s) stored", result.new_blobs)).dim());
    }
    for skipped in &result.skipped {
        eprintln!(
            "  {}{}",
            WARN_ICON,
            style(format!("skipped {}: {}", skipped.path.display(), skipped.reason)).yellow()
        );
    }
}

pub fn log(entries: &[LogEntry]) {
    if entries.is_empty() {
        println!("{}", style("No commits yet.").dim());
        return;
    }
    for entry in entries {
        println!(
            "{}  {}  {}",
            style(format!("{:>4}", entry.id)).yellow(),
            style(&entry.timestamp).dim(),
            entry.message
        );
    }
}

pub fn plan(plan: &CheckoutPlan) {
    println!(
        "{}",
        style(format!("Checkout plan for commit {}", plan.commit_id)).bold()
    );
    for write in &plan.writes {
        if write.unchanged {
            println!("  {} {}", style("unchanged").dim(), write.repo_path);
        } else {
            println!("  {}     {}", style("write").green(), write.repo_path);
        }
    }
    for delete in &plan.deletes {
        println!("  {}    {}", style("delete").red(), delete.repo_path);
    }
    println!(
        "{}",
        style(format!(
            "{} write(s), {} delete(s)",
            plan.pending_writes(),
            plan.deletes.len()
        ))
        .dim()
    );
}

pub fn checkout(result: &CheckoutResult) {
    println!("{}{}", CHECK, style(&result.summary).green());
    if result.files_unchanged > 0 {
        println!(
            "  {}",
            style(format!("{} file(s) already up to date", result.files_unchanged)).dim()
        );
    }
    if result.delete_failures > 0 {
        eprintln!(
            "  {}{}",
            WARN_ICON,
            style(format!(
                "{} file(s) could not be deleted (run with -v for details)",
                result.delete_failures
            ))
            .yellow()
        );
    }
}

pub fn files(files: &[FileEntry]) {
    for file in files {
        println!("{}  {}", style(file.hash.short()).dim(), file.path);
    }
}

pub fn stats(stats: &RepoStats) {
    println!("{}", style("Repository").bold());
    println!("  Commits:         {}", stats.commits);
    match stats.latest_commit {
        Some(id) => println!("  Latest commit:   {}", id),
        None => println!("  Latest commit:   -"),
    }
    println!("  Tracked entries: {}", stats.tracked_entries);
    println!("{}", style("Blobs").bold());
    println!("  Unique blobs:    {}", stats.blobs.blob_count);
    println!("  Total size:      {}", format_bytes(stats.blobs.total_bytes));
    println!(
        "  Average size:    {}",
        format_bytes(stats.blobs.avg_blob_size())
    );
    println!(
        "  Size histogram:  <1K {} | <1M {} | <100M {} | larger {}",
        stats.blobs.small_blobs,
        stats.blobs.medium_blobs,
        stats.blobs.large_blobs,
        stats.blobs.huge_blobs
    );
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
