//! One-shot question command

use super::{print_answer, print_report};
use crate::utils::read_uploads;
use anyhow::Result;
use finchat::{Config, RetrievalChain, StoreConfig};
use std::path::PathBuf;

/// A one-shot question indexes its files in memory, leaving the saved index alone
fn one_shot_config(config: &Config) -> Config {
    Config {
        store: StoreConfig::memory(),
        ..config.clone()
    }
}

pub async fn run_ask(config: &Config, token: Option<&str>, files: &[PathBuf], question: &str) -> Result<()> {
    let uploads = read_uploads(files, config.limits.max_upload_bytes)?;
    if uploads.is_empty() {
        anyhow::bail!("No PDF files found");
    }

    let config = one_shot_config(config);
    let mut chain = RetrievalChain::load(&config, token, true).await?;
    chain.upload_documents(uploads)?;
    let report = chain.process_documents().await?;
    print_report(&report);

    let answer = chain.ask(question).await?;
    print_answer(&answer);
    Ok(())
}
