//! CLI command handlers

pub mod ask;
pub mod chat;
pub mod info;
pub mod init;
pub mod login;

pub use ask::run_ask;
pub use chat::run_chat;
pub use info::run_info;
pub use init::run_init;
pub use login::run_login;

use colored::Colorize;
use finchat::{Answer, Error, ProcessReport};

/// Print a library error: the per-kind message first, the detail dimmed
pub fn report_error(err: &Error) {
    eprintln!("{} {}", "✗".red(), err.user_message());
    eprintln!("  {}", err.to_string().dimmed());
}

pub fn print_report(report: &ProcessReport) {
    if report.documents == 0 {
        println!("{} No documents uploaded, nothing to process.", "!".yellow());
        return;
    }
    if report.chunks == 0 {
        println!(
            "{} {} document(s) contained no extractable text. Nothing was indexed.",
            "!".yellow(),
            report.documents
        );
        return;
    }
    println!(
        "{} Processed {} document(s) into {} chunks{}",
        "✓".green(),
        report.documents,
        report.chunks,
        if report.durable { " (saved)" } else { "" }
    );
    if report.empty_documents > 0 {
        println!("  {} document(s) had no extractable text", report.empty_documents);
    }
}

pub fn print_answer(answer: &Answer) {
    println!("\n{}\n", answer.text);
    if answer.sources.is_empty() {
        return;
    }
    println!("{}", "Sources:".dimmed());
    for (i, chunk) in answer.sources.iter().enumerate() {
        let source = chunk.metadata.get("source").map(String::as_str).unwrap_or("?");
        let preview: String = chunk.text.chars().take(80).collect::<String>().replace('\n', " ");
        println!("  {}. [{}] {}…", i + 1, source, preview.trim());
    }
    println!();
}
