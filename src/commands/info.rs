//! Info command handler

use crate::utils::{dir_size, format_bytes};
use anyhow::Result;
use colored::Colorize;
use finchat::{gpu_support_info, resolve_token, Backend, Config, LanceStore, StoreBackend, VectorStore};

pub async fn run_info(config: &Config) -> Result<()> {
    println!("{}\n", "finchat - Chat with your PDFs".bold());

    let path = Config::path()?;
    if Config::exists() {
        println!("Config:     {}", path.display());
    } else {
        println!("Config:     defaults ({} not found, run 'finchat init')", path.display());
    }

    let e = &config.embedder;
    match e.backend {
        Backend::Local => println!(
            "Embedding:  {} ({}MB, {} dims) on {}",
            e.model.name,
            e.model.size_mb,
            e.model.dimensions,
            e.device.name()
        ),
        Backend::Remote => println!("Embedding:  {} (hosted, {} dims)", e.model.repo_id, e.model.dimensions),
    }

    let g = &config.generation;
    match g.backend {
        Backend::Local => println!("Generation: {} ({}MB) on {}", g.model.name, g.model.size_mb, g.device.name()),
        Backend::Remote => println!("Generation: {} (hosted)", g.model.remote_model),
    }
    println!(
        "Sampling:   temperature {}, max {} new tokens",
        g.temperature, g.max_new_tokens
    );
    println!(
        "Chunking:   {} chars, {} overlap  |  Retrieval: top {} chunks, {} turns of history",
        config.chunker.chunk_size,
        config.chunker.chunk_overlap,
        config.retrieval.top_k,
        config.retrieval.history_window
    );

    let login = if resolve_token(None).is_some() { "available".green() } else { "none".yellow() };
    println!("HF token:   {}", login);

    // Show GPU support info
    let gpu_info = gpu_support_info();
    println!("\nGPU Support: {}", gpu_info.summary());
    if !gpu_info.any_gpu() {
        println!("  Rebuild with --features metal (macOS) or --features cuda (NVIDIA)");
    }

    match config.store.backend {
        StoreBackend::Memory => println!("\nIndex: in memory (not persisted)"),
        StoreBackend::Lance => {
            let dir = config.store.resolved_dir()?;
            println!("\nIndex: LanceDB at {}", dir.display());
            if dir.exists() {
                println!("  Size:   {}", format_bytes(dir_size(&dir)));
                match LanceStore::open(&dir, e.model.dimensions).await {
                    Ok(store) => println!("  Chunks: {}", store.len().await?),
                    Err(err) => println!("  {}", err.to_string().yellow()),
                }
            } else {
                println!("  Empty (nothing processed yet)");
            }
        }
    }

    Ok(())
}
