//! Init command handler

use anyhow::Result;
use colored::Colorize;
use finchat::Config;

pub fn run_init(force: bool) -> Result<()> {
    let path = Config::path()?;
    if Config::exists() && !force {
        println!(
            "{} {} already exists. Use --force to overwrite it with defaults.",
            "!".yellow(),
            path.display()
        );
        return Ok(());
    }

    let config = Config::default();
    config.save()?;
    println!("{} Configuration saved to {}", "✓".green(), path.display());
    println!("\nDefaults:");
    println!("  Embedding model:  {}", config.embedder.model.repo_id);
    println!(
        "  Generation model: {} / {}",
        config.generation.model.gguf_repo, config.generation.model.gguf_file
    );
    println!("\nEdit the file to switch models or use the hosted backends (backend = \"remote\").");
    Ok(())
}
