use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::{EmbeddingProvider, OllamaClient};
use crate::indexer::Indexer;
use crate::service::{RagService, RebuildAck};

/// Characters of chunk text shown per search hit
const PREVIEW_CHARS: usize = 200;

/// What a line typed in the interactive `ask` loop asks for
#[derive(Debug, Clone, PartialEq, Eq)]
enum LoopInput {
    Exit,
    Rebuild,
    Status,
    Question(String),
    Blank,
}

fn parse_loop_input(line: &str) -> LoopInput {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => LoopInput::Blank,
        "exit" | "quit" => LoopInput::Exit,
        "rebuild" => LoopInput::Rebuild,
        "status" => LoopInput::Status,
        _ => LoopInput::Question(line.to_string()),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn ollama_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    Ok(Arc::new(client))
}

fn print_result(rank: usize, result: &SearchResult) {
    let metadata = &result.metadata;
    println!(
        "{}. {} {}",
        rank,
        style(metadata.title.as_deref().unwrap_or("(sans titre)")).bold(),
        style(format!("[{}]", metadata.chunk_id)).dim()
    );
    if let Some(city) = &metadata.city {
        println!("   Ville: {}", city);
    }
    if let Some(start) = &metadata.start_date {
        match &metadata.end_date {
            Some(end) => println!("   Dates: {} → {}", start, end),
            None => println!("   Date: {}", start),
        }
    }
    if let Some(url) = &metadata.url {
        println!("   URL: {}", style(url).cyan());
    }
    println!("   Distance: {:.4}", result.distance);
    println!("   {}", preview(&result.content, PREVIEW_CHARS));
    println!();
}

/// Fetch, prepare, embed and store the events of a region
#[inline]
pub async fn build_index(config: &Config, region: Option<String>, dry_run: bool) -> Result<()> {
    let region = region.unwrap_or_else(|| config.agenda.region.clone());
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;

    if !dry_run {
        client
            .validate_model()
            .context("Ollama is not ready for embedding, run 'agenda-rag config' first")?;
    }

    let indexer = Indexer::new(config, Arc::new(client))?;

    if dry_run {
        let prepared = indexer.prepare(&region).await?;
        println!("🔎 Dry run for region {}", style(&region).cyan());
        println!("   Events fetched: {}", prepared.raw_count);
        println!("   Records with text: {}", prepared.cleaned_count);
        println!("   Records kept: {}", prepared.filtered_count);
        println!("   Chunks: {}", prepared.len());
        if let (Some(text), Some(metadata)) = (prepared.texts.first(), prepared.metadatas.first()) {
            println!();
            println!("First chunk ({}):", metadata.chunk_id);
            println!("   {}", preview(text, PREVIEW_CHARS));
        }
        return Ok(());
    }

    println!("🏗️  Building index for region {}", style(&region).cyan());
    let stats = indexer.rebuild(&region).await?;

    println!("{}", style("✅ Index built successfully!").green());
    println!("   Events fetched: {}", stats.events_fetched);
    println!("   Records with text: {}", stats.records_cleaned);
    println!("   Records kept: {}", stats.records_kept);
    println!("   Chunks embedded: {}", stats.embeddings_stored);
    println!("   Duration: {:.1?}", stats.duration);

    Ok(())
}

/// Print the chunks closest to a query
#[inline]
pub async fn search_events(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let service = RagService::new(config, ollama_embedder(config)?).await?;
    let limit = limit.unwrap_or(config.retrieval.top_k);

    let results = service.search(query, limit).await?;
    if results.is_empty() {
        println!("No matching events found.");
        return Ok(());
    }

    println!("Results for \"{}\":", query.trim());
    println!();
    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }

    Ok(())
}

/// Interactive question loop over the index.
///
/// `exit` quits, `rebuild` starts a background rebuild and `status` reports on it.
#[inline]
pub async fn ask_loop(config: &Config) -> Result<()> {
    let service = RagService::new(config, ollama_embedder(config)?).await?;

    println!("{}", style("💬 Ask about upcoming events").bold().cyan());
    println!("Type 'rebuild' to refresh the index, 'status' to check it, 'exit' to quit.");
    if let crate::service::ServiceState::NotReady { reason } = service.state().await {
        println!("{} {}", style("⚠ Index not ready:").yellow(), reason);
    }
    println!();

    loop {
        let line: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;

        match parse_loop_input(&line) {
            LoopInput::Exit => break,
            LoopInput::Blank => continue,
            LoopInput::Rebuild => match service.rebuild() {
                RebuildAck::Started(handle) => {
                    println!("🔄 Rebuild started in the background");
                    tokio::spawn(async move {
                        match handle.await {
                            Ok(Ok(stats)) => {
                                info!("Rebuild finished: {} chunks", stats.chunks_created);
                            }
                            Ok(Err(e)) => error!("Rebuild failed: {}", e),
                            Err(e) => error!("Rebuild task failed: {}", e),
                        }
                    });
                }
                RebuildAck::AlreadyRunning => println!("⏳ A rebuild is already running"),
            },
            LoopInput::Status => match service.status().await {
                Ok(status) => {
                    println!("   State: {:?}", status.state);
                    println!("   Chunks: {}", status.chunk_count);
                    println!("   Rebuilding: {}", status.rebuilding);
                }
                Err(e) => println!("   ❌ Status unavailable: {}", e),
            },
            LoopInput::Question(question) => match service.ask(&question).await {
                Ok(answer) => {
                    if answer.sources.is_empty() {
                        println!("No matching events found.");
                    }
                    for (i, source) in answer.sources.iter().enumerate() {
                        print_result(i + 1, source);
                    }
                }
                Err(e) if e.is_client_error() => println!("⚠ {}", e),
                Err(e) => {
                    warn!("Question failed: {}", e);
                    println!("❌ {}", e);
                }
            },
        }
    }

    Ok(())
}

/// Report on configuration, Ollama and the vector index
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 Agenda RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("⚙️  Configuration:");
    println!("   📁 Directory: {}", config.get_base_dir().display());
    println!("   🗺️  Region: {}", config.agenda.region);
    println!(
        "   ✂️  Chunks: {} chars, {} overlap, records under {} chars skipped",
        config.processing.chunk_size, config.processing.chunk_overlap, config.processing.min_chars
    );

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.validate_model() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Err(e) => println!("   ⚠️  Ollama: Not ready - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Failed to create client - {:#}", e),
    }

    println!("🔍 Vector Index Status:");
    match VectorStore::new(config).await {
        Ok(store) => match (store.count_embeddings().await, store.vector_dimension().await) {
            (Ok(0), _) => println!("   📭 No index built yet"),
            (Ok(count), Ok(dimension)) => {
                println!("   ✅ LanceDB: {} chunks", count);
                if let Some(dimension) = dimension {
                    println!("   📐 Dimensions: {}", dimension);
                    if dimension != config.ollama.embedding_dimension as usize {
                        println!(
                            "   ⚠️  Configured embedding dimension is {}, rebuild the index",
                            config.ollama.embedding_dimension
                        );
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => println!("   ❌ LanceDB: {}", e),
        },
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'agenda-rag build' to (re)build the index");
    println!("   • Use 'agenda-rag ask' to query upcoming events");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_input_keywords() {
        assert_eq!(parse_loop_input("exit"), LoopInput::Exit);
        assert_eq!(parse_loop_input("  QUIT "), LoopInput::Exit);
        assert_eq!(parse_loop_input("rebuild"), LoopInput::Rebuild);
        assert_eq!(parse_loop_input("Status"), LoopInput::Status);
        assert_eq!(parse_loop_input("   "), LoopInput::Blank);
    }

    #[test]
    fn loop_input_questions_are_trimmed() {
        assert_eq!(
            parse_loop_input("  Quels concerts à Toulouse ? "),
            LoopInput::Question("Quels concerts à Toulouse ?".to_string())
        );
        assert_eq!(
            parse_loop_input("rebuild the index"),
            LoopInput::Question("rebuild the index".to_string())
        );
    }

    #[test]
    fn preview_cuts_on_characters() {
        assert_eq!(preview("abc", 5), "abc");
        assert_eq!(preview("abcdef", 3), "abc…");
        assert_eq!(preview("ééééé", 2), "éé…");
    }
}
