//! Interactive chat session

use super::{print_answer, print_report, report_error};
use crate::utils::read_uploads;
use anyhow::Result;
use colored::Colorize;
use finchat::{save_token, Config, HubClient, RetrievalChain};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of REPL input
#[derive(Debug, PartialEq)]
enum ReplCommand {
    Ask(String),
    Upload(Vec<PathBuf>),
    Process,
    History,
    Status,
    Reset,
    Login(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    let Some(rest) = line.strip_prefix(':') else {
        return ReplCommand::Ask(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match name {
        "upload" | "u" => ReplCommand::Upload(args.iter().map(PathBuf::from).collect()),
        "process" | "p" => ReplCommand::Process,
        "history" | "h" => ReplCommand::History,
        "status" | "s" => ReplCommand::Status,
        "reset" => ReplCommand::Reset,
        "login" => ReplCommand::Login(args.join(" ")),
        "help" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

fn print_help() {
    println!("  {}  stage PDF files or directories", ":upload PATHS".cyan());
    println!("  {}        build the index from the staged PDFs", ":process".cyan());
    println!("  {}        show this session's questions and answers", ":history".cyan());
    println!("  {}         show session status", ":status".cyan());
    println!("  {}          clear the index, history and uploads", ":reset".cyan());
    println!("  {}    validate and save a Hugging Face token", ":login TOKEN".cyan());
    println!("  {}           leave", ":quit".cyan());
    println!("  Anything else is asked as a question.");
}

async fn print_status(chain: &RetrievalChain) {
    let chunks = match chain.indexed_chunks().await {
        Ok(n) => n.to_string(),
        Err(_) => "?".to_string(),
    };
    println!(
        "Status: {}  |  indexed chunks: {}  |  staged PDFs: {}  |  turns: {}",
        chain.status().as_str().bold(),
        chunks,
        chain.pending_uploads().len(),
        chain.history().len()
    );
}

fn stage(chain: &mut RetrievalChain, paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("{} Usage: :upload PATHS", "!".yellow());
        return;
    }
    let uploads = match read_uploads(paths, chain.config().max_upload_bytes) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            return;
        }
    };
    match chain.upload_documents(uploads) {
        Ok(n) => println!("{} Staged {} PDF(s). Run :process to index them.", "✓".green(), n),
        Err(e) => report_error(&e),
    }
}

async fn process(chain: &mut RetrievalChain) {
    println!("Processing...");
    match chain.process_documents().await {
        Ok(report) => print_report(&report),
        Err(e) => report_error(&e),
    }
}

async fn login(config: &Config, token: &str) {
    let client = match HubClient::new(&config.hub) {
        Ok(c) => c,
        Err(e) => return report_error(&e),
    };
    match client.login(token).await {
        Ok(identity) => {
            println!("{} Logged in as {}", "✓".green(), identity.name.bold());
            match save_token(token) {
                Ok(path) => println!("  Token saved to {} (used the next time models load)", path.display()),
                Err(e) => report_error(&e),
            }
        }
        Err(e) => report_error(&e),
    }
}

pub async fn run_chat(config: &Config, token: Option<String>, paths: &[PathBuf]) -> Result<()> {
    println!("{}\n", "finchat - chat with your PDFs".bold());
    println!("Loading models...");
    let mut chain = RetrievalChain::load(config, token.as_deref(), true).await?;
    println!(
        "  Embeddings: {}\n  Generation: {}\n  Store:      {}\n",
        chain.embedder_name(),
        chain.generator_name(),
        chain.store_name()
    );

    if !paths.is_empty() {
        stage(&mut chain, paths);
        if !chain.pending_uploads().is_empty() {
            process(&mut chain).await;
        }
    }
    print_status(&chain).await;
    println!("Type a question, or :help for commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Help => print_help(),
            ReplCommand::Upload(paths) => stage(&mut chain, &paths),
            ReplCommand::Process => process(&mut chain).await,
            ReplCommand::History => {
                if chain.history().is_empty() {
                    println!("No questions asked yet.");
                }
                for (i, turn) in chain.history().iter().enumerate() {
                    println!("{} {}", format!("Q{}:", i + 1).bold(), turn.question);
                    println!("{} {}\n", format!("A{}:", i + 1).dimmed(), turn.answer);
                }
            }
            ReplCommand::Status => print_status(&chain).await,
            ReplCommand::Reset => match chain.reset().await {
                Ok(()) => println!("{} Session cleared.", "✓".green()),
                Err(e) => report_error(&e),
            },
            ReplCommand::Login(token) => login(config, &token).await,
            ReplCommand::Ask(question) => match chain.ask(&question).await {
                Ok(answer) => print_answer(&answer),
                Err(e) => report_error(&e),
            },
            ReplCommand::Unknown(name) => {
                println!("{} Unknown command ':{}'. Type :help.", "!".yellow(), name);
            }
        }
    }

    println!("Bye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            parse_command("  How did revenue change? "),
            ReplCommand::Ask("How did revenue change?".to_string())
        );
    }

    #[test]
    fn test_commands_and_aliases() {
        assert_eq!(parse_command(":process"), ReplCommand::Process);
        assert_eq!(parse_command(":q"), ReplCommand::Quit);
        assert_eq!(parse_command(":history"), ReplCommand::History);
        assert_eq!(
            parse_command(":upload a.pdf reports/"),
            ReplCommand::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("reports/")])
        );
        assert_eq!(parse_command(":login hf_abc"), ReplCommand::Login("hf_abc".to_string()));
        assert_eq!(parse_command(":bogus"), ReplCommand::Unknown("bogus".to_string()));
    }
}
