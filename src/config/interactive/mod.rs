
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::settings::MAX_PAGE_SIZE;
use super::{AgendaConfig, Config, ConfigError, OllamaConfig};
use crate::processing::ProcessingConfig;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Agenda RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure your local Ollama instance for embedding generation.");
    eprintln!();
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Agenda Source").bold().yellow());
    eprintln!("Choose which public events are indexed.");
    eprintln!();
    configure_agenda(&mut config.agenda)?;

    eprintln!();
    eprintln!("{}", style("Processing").bold().yellow());
    configure_processing(&mut config.processing)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before building the index.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!(
        "  Batch Delay: {} ms",
        style(config.ollama.batch_delay_ms).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Agenda Settings:").bold().yellow());
    eprintln!("  API: {}", style(&config.agenda.api_url).cyan());
    eprintln!("  Region: {}", style(&config.agenda.region).cyan());
    eprintln!("  Page Size: {}", style(config.agenda.page_size).cyan());
    eprintln!(
        "  Window: ±{} days",
        style(config.agenda.window_days).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Processing Settings:").bold().yellow());
    eprintln!(
        "  Min Characters: {}",
        style(config.processing.min_chars).cyan()
    );
    eprintln!(
        "  Chunk Size: {}",
        style(config.processing.chunk_size).cyan()
    );
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.processing.chunk_overlap).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Vector index: {}",
        style(config.vector_database_path().display()).dim()
    );
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            candidate.ollama_url().map(|_| ())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_delay_ms: u64 = Input::new()
        .with_prompt("Pause between embedding batches (ms)")
        .default(ollama.batch_delay_ms)
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;
    ollama.batch_delay_ms = batch_delay_ms;

    Ok(())
}

fn configure_agenda(agenda: &mut AgendaConfig) -> Result<()> {
    let region: String = Input::new()
        .with_prompt("Region")
        .default(agenda.region.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Region cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let page_size: u32 = Input::new()
        .with_prompt("Events per API page")
        .default(agenda.page_size)
        .validate_with(|input: &u32| -> Result<(), String> {
            if *input == 0 || *input > MAX_PAGE_SIZE {
                Err(format!("Page size must be between 1 and {MAX_PAGE_SIZE}"))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let window_days: u32 = Input::new()
        .with_prompt("Date window around today (days)")
        .default(agenda.window_days)
        .interact_text()?;

    agenda.set_region(region)?;
    agenda.set_page_size(page_size)?;
    agenda.set_window_days(window_days)?;

    Ok(())
}

fn configure_processing(processing: &mut ProcessingConfig) -> Result<()> {
    let min_chars: usize = Input::new()
        .with_prompt("Minimum characters per event")
        .default(processing.min_chars)
        .interact_text()?;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(processing.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(processing.chunk_overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input >= chunk_size {
                Err("Overlap must be smaller than the chunk size")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let candidate = ProcessingConfig {
        min_chars,
        chunk_size,
        chunk_overlap,
    };
    candidate.validate().map_err(ConfigError::from)?;
    *processing = candidate;

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
