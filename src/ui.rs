// UI layer: everything the user sees on stdout. Spinners are drawn on
// stderr by indicatif and stay hidden when it is not a terminal.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{DownloadOutcome, HashListSummary, SubmissionReport};
use crate::auto_submit::{LoopSummary, RoundOutcome};

/// Spinner shown while a request is in flight. Call `finish_and_clear`
/// once the request returns.
pub fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn format_hash_list(list: &HashListSummary) -> String {
    format!("[*] [ID: {}] Name: {}", list.id, list.name)
}

pub fn print_hash_lists(lists: &[HashListSummary]) {
    println!("[*] Available hash lists:");
    for list in lists {
        println!("{}", format_hash_list(list));
    }
}

pub fn format_download(outcome: &DownloadOutcome) -> String {
    format!(
        "[*] Saved {} entries to {}",
        outcome.entries,
        outcome.path.display()
    )
}

pub fn format_report(report: &SubmissionReport) -> String {
    let mut line = format!(
        "[*] [ID: {}] Username: {} | Found Count: {} | Added Score: {:.2} | Total Score: {:.2} | New Items: {}",
        report.hash_list_id,
        report.username,
        report.found_count,
        report.added_score,
        report.total_score,
        report.new_items
    );
    if let Some(error) = &report.error {
        line.push_str(&format!(" | Error: {}", error));
    }
    line
}

pub fn print_report(report: &SubmissionReport) {
    println!("{}", format_report(report));
}

pub fn print_round(outcome: &RoundOutcome) {
    print_report(&outcome.report);
    println!(
        "[*] Round {}: {} new line(s) recorded, {} in ledger",
        outcome.round, outcome.appended, outcome.ledger_size
    );
}

pub fn print_summary(summary: &LoopSummary) {
    println!(
        "[*] Stopped after {} round(s), {} line(s) recorded",
        summary.rounds, summary.appended
    );
}
