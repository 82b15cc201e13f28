use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use localrag_core::config::{expand_path, Config, RagConfig};
use localrag_core::loader::load_txt_documents;
use localrag_core::traits::CacheBackup;
use localrag_core::types::{Document, RagSearchResult, SearchOptions};
use localrag_embed::provider_from_config;
use localrag_engine::RagOrchestrator;

const USAGE: &str = "Usage:
  localrag query <text> [--dir D] [--top-k N] [--threshold T] [--source S] [--no-cache] [--backup URI]
  localrag context <text> [same options]
  localrag stats [--dir D] [--backup URI]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Query,
    Context,
    Stats,
}

#[derive(Debug)]
struct Args {
    command: Command,
    text: Option<String>,
    dir: Option<PathBuf>,
    backup: Option<String>,
    options: SearchOptions,
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i + 1).map(String::as_str).ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let command = match args.first().map(String::as_str) {
        Some("query") => Command::Query,
        Some("context") => Command::Context,
        Some("stats") => Command::Stats,
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    };
    let mut parsed = Args { command, text: None, dir: None, backup: None, options: SearchOptions::new() };
    let mut words = Vec::new();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" => { parsed.dir = Some(expand_path(value(args, i, "--dir")?)); i += 1; }
            "--top-k" => {
                let k = value(args, i, "--top-k")?.parse::<usize>().context("--top-k requires a number")?;
                parsed.options = parsed.options.top_k(k);
                i += 1;
            }
            "--threshold" => {
                let t = value(args, i, "--threshold")?.parse::<f32>().context("--threshold requires a number")?;
                parsed.options = parsed.options.similarity_threshold(t);
                i += 1;
            }
            "--source" => { parsed.options = parsed.options.source(value(args, i, "--source")?); i += 1; }
            "--backup" => { parsed.backup = Some(value(args, i, "--backup")?.to_string()); i += 1; }
            "--no-cache" => parsed.options = parsed.options.use_cache(false),
            flag if flag.starts_with("--") => bail!("unknown option '{}'\n{}", flag, USAGE),
            word => words.push(word.to_string()),
        }
        i += 1;
    }
    if !words.is_empty() {
        parsed.text = Some(words.join(" "));
    }
    if parsed.command != Command::Stats && parsed.text.is_none() {
        bail!("missing query text\n{}", USAGE);
    }
    Ok(parsed)
}

#[cfg(feature = "lance")]
async fn open_backup(uri: Option<&str>, dim: usize) -> anyhow::Result<Option<Arc<dyn CacheBackup>>> {
    let Some(uri) = uri else { return Ok(None) };
    let backup = localrag_cache::LanceBackup::open(uri, localrag_cache::lance::DEFAULT_TABLE, dim).await?;
    Ok(Some(Arc::new(backup)))
}

#[cfg(not(feature = "lance"))]
async fn open_backup(uri: Option<&str>, _dim: usize) -> anyhow::Result<Option<Arc<dyn CacheBackup>>> {
    match uri {
        Some(_) => bail!("--backup requires the `lance` feature"),
        None => Ok(None),
    }
}

async fn build_index(rag: &RagOrchestrator, documents: Vec<Document>) -> anyhow::Result<()> {
    let mut by_source: BTreeMap<String, Vec<Document>> = BTreeMap::new();
    for doc in documents {
        by_source.entry(doc.source.clone()).or_default().push(doc);
    }
    let pb = ProgressBar::new(by_source.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sources {msg}")?
            .progress_chars("#>-"),
    );
    for (source, docs) in &by_source {
        pb.set_message(source.clone());
        rag.index_documents(docs).await.with_context(|| format!("indexing source '{}'", source))?;
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} chunks", rag.chunk_count()));
    Ok(())
}

fn print_result(query: &str, result: &RagSearchResult) {
    if let Some(fallback) = result.fallback_response.as_ref().filter(|_| result.used_fallback) {
        println!("No indexed content matched \"{}\".", query);
        println!("\n{}", fallback.message);
        let actions: Vec<&str> = fallback.action_suggestions.iter().map(|a| a.as_str()).collect();
        println!("\ntype={:?} escalate={} actions=[{}]", fallback.response_type, fallback.should_escalate, actions.join(", "));
        if let Some(reason) = fallback.escalation_reason {
            println!("escalation reason: {}", reason);
        }
        return;
    }
    println!("Found {} result(s) for \"{}\" (cache hit: {})", result.total_found, query, result.cache_hit);
    for (i, (chunk, score)) in result.chunks.iter().zip(&result.relevance_scores).enumerate() {
        println!(
            "\n  {}. score={:.4}  source={}  chunk={}/{}",
            i + 1,
            score,
            chunk.metadata.source,
            chunk.metadata.chunk_index + 1,
            chunk.metadata.total_chunks
        );
        println!("     {}", chunk.text);
    }
}

async fn run(args: Args, config: RagConfig) -> anyhow::Result<()> {
    let provider = provider_from_config(&config.embedding)?;
    let backup = open_backup(args.backup.as_deref(), config.embedding.dimension).await?;
    let rag = RagOrchestrator::new(provider, &config, backup)?;

    let dir = args.dir.clone().unwrap_or_else(|| config.raw_txt_dir());
    let documents = load_txt_documents(&dir).with_context(|| format!("loading documents from {}", dir.display()))?;
    tracing::info!(dir = %dir.display(), documents = documents.len(), "loaded corpus");
    build_index(&rag, documents).await?;

    match args.command {
        Command::Query => {
            let text = args.text.unwrap_or_default();
            let result = rag.search(&text, &args.options).await?;
            print_result(&text, &result);
        }
        Command::Context => {
            let text = args.text.unwrap_or_default();
            println!("{}", rag.get_context(&text, &args.options).await?);
        }
        Command::Stats => {
            println!("chunks:  {}", rag.chunk_count());
            println!("sources: {}", rag.sources().join(", "));
            println!("cache:   {}", serde_json::to_string_pretty(&rag.cache_stats())?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    let config = Config::load()
        .and_then(|c| c.rag())
        .map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    run(args, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> { s.split_whitespace().map(String::from).collect() }

    #[test]
    fn parses_query_with_options() {
        let args = parse_args(&argv("query what is qribar --top-k 3 --threshold 0.2 --source qribar --no-cache")).unwrap();
        assert_eq!(args.command, Command::Query);
        assert_eq!(args.text.as_deref(), Some("what is qribar"));
        assert_eq!(args.options.top_k, Some(3));
        assert_eq!(args.options.similarity_threshold, Some(0.2));
        assert_eq!(args.options.source.as_deref(), Some("qribar"));
        assert_eq!(args.options.use_cache, Some(false));
    }

    #[test]
    fn stats_needs_no_text() {
        let args = parse_args(&argv("stats --dir /tmp/corpus")).unwrap();
        assert_eq!(args.command, Command::Stats);
        assert_eq!(args.dir, Some(PathBuf::from("/tmp/corpus")));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&argv("query")).is_err());
        assert!(parse_args(&argv("query x --top-k many")).is_err());
        assert!(parse_args(&argv("query x --threshold")).is_err());
        assert!(parse_args(&argv("search x")).is_err());
        assert!(parse_args(&[]).is_err());
    }
}
