//! Login command handler

use anyhow::Result;
use colored::Colorize;
use finchat::{save_token, Config, HubClient};

pub async fn run_login(config: &Config, token: &str, save: bool) -> Result<()> {
    let client = HubClient::new(&config.hub)?;
    let identity = client.login(token).await?;
    println!("{} Logged in to Hugging Face as {}", "✓".green(), identity.name.bold());

    if save {
        let path = save_token(token)?;
        println!("  Token saved to {}", path.display());
    }
    Ok(())
}
