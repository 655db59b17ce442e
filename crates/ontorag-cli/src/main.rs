//! Ontorag CLI - ontology-backed retrieval for requirements assistants

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ontorag_core::KnowledgeBase;
use ontorag_core::config::Config;
use ontorag_core::routing::{AgentRole, QuestionRouter};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ontorag")]
#[command(author, version, about = "Ontology-backed retrieval for requirements assistants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the knowledge base from a Turtle ontology
    Ingest {
        /// Turtle file (defaults to ingest.source)
        path: Option<PathBuf>,
    },

    /// Assemble context for a query
    Search {
        /// Free-text query
        query: String,
    },

    /// Show which agent a question is routed to
    Route {
        /// The question
        question: String,
    },

    /// List the rules stored in the knowledge base
    Rules,

    /// List concept labels
    Concepts,

    /// Show knowledge base statistics
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ontorag=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { path } => cmd_ingest(path, cli.format, cli.quiet).await,
        Commands::Search { query } => cmd_search(&query, cli.format).await,
        Commands::Route { question } => cmd_route(&question, cli.format, cli.quiet),
        Commands::Rules => cmd_rules(cli.format).await,
        Commands::Concepts => cmd_concepts(cli.format, cli.quiet).await,
        Commands::Stats => cmd_stats(cli.format).await,
        Commands::Config { action } => cmd_config(action, cli.quiet),
        Commands::Doctor => cmd_doctor(cli.quiet).await,
    }
}

async fn open_knowledge_base() -> anyhow::Result<KnowledgeBase> {
    let config = Config::load()?;
    Ok(KnowledgeBase::open(&config).await?)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_ingest(path: Option<PathBuf>, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let kb = open_knowledge_base().await?;
    let source = path.unwrap_or_else(|| kb.config().ingest.source.clone());

    if !quiet && format == OutputFormat::Text {
        println!("Ingesting '{}'...", source.display());
    }

    let result = kb.ingest(Some(source.as_path())).await;
    kb.close().await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(hint) = e.suggestion() {
                eprintln!("[{}] {}\n  Try: {}", e.code(), e, hint);
            }
            return Err(e.into());
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            if !quiet {
                println!("Ingestion complete.");
                println!("  Triples parsed: {}", report.triples_parsed);
                println!("  Entities: {}", report.entities_ingested);
                println!("  Relationships: {}", report.relationships_created);
                if report.relationships_skipped > 0 {
                    println!(
                        "  Relationships skipped (missing endpoint): {}",
                        report.relationships_skipped
                    );
                }
                println!("  Took: {} ms", report.duration_ms);
            }
        }
    }

    Ok(())
}

async fn cmd_search(query: &str, format: OutputFormat) -> anyhow::Result<()> {
    let kb = open_knowledge_base().await?;
    let outcome = kb.retriever().search_detailed(query).await;
    kb.close().await;

    if let Some(reason) = &outcome.vector_unavailable {
        warn!(reason = %reason, "Vector index unavailable, answered from exact matches only");
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => println!("{}", outcome.context),
    }

    Ok(())
}

fn cmd_route(question: &str, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let router = QuestionRouter::from_config(&config.routing);
    let role = router.route(question);
    let keyword = router.matched_keyword(question);

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "role": role,
                "keyword": keyword,
                "uses_knowledge_base": role.uses_knowledge_base(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("{}", role);
            if !quiet {
                match (role, keyword) {
                    (AgentRole::Expert, Some(k)) => println!("  Matched keyword: {}", k),
                    _ => println!("  No expert keyword matched"),
                }
            }
        }
    }

    Ok(())
}

async fn cmd_rules(format: OutputFormat) -> anyhow::Result<()> {
    let kb = open_knowledge_base().await?;
    let catalog = kb.catalog();

    match format {
        OutputFormat::Json => {
            let rules = catalog.rules().await?;
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        OutputFormat::Text => {
            let text = catalog.rules_text().await?;
            print!("{}", text);
        }
    }

    kb.close().await;
    Ok(())
}

async fn cmd_concepts(format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let kb = open_knowledge_base().await?;
    let labels = kb.catalog().concept_labels().await?;
    kb.close().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&labels)?),
        OutputFormat::Text => {
            if labels.is_empty() {
                if !quiet {
                    println!("No concepts found.");
                    println!("\nPopulate the knowledge base with: ontorag ingest <file.ttl>");
                }
            } else {
                for label in labels {
                    println!("{}", label);
                }
            }
        }
    }

    Ok(())
}

async fn cmd_stats(format: OutputFormat) -> anyhow::Result<()> {
    let kb = open_knowledge_base().await?;
    let stats = kb.stats().await?;
    kb.close().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("Knowledge base: {}", stats.database_path.display());
            println!("  Collection: {}", stats.collection);
            println!("  Entities: {}", stats.entities);
            for (entity_type, count) in &stats.entities_by_type {
                println!("    {}: {}", entity_type, count);
            }
            println!("  Relationships: {}", stats.relationships);
            println!("  Embeddings: {}", stats.embeddings);
        }
    }

    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Ontorag Health Check");
        println!("====================");
        println!();
    }

    let mut all_ok = true;

    let config = match Config::load().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
            }
            Some(config)
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {:#}", e);
            }
            None
        }
    };

    if let Some(config) = &config {
        all_ok &= check_environment(config, quiet).await?;
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    } else {
        info!(ok = all_ok, "Health check finished");
    }

    if !all_ok {
        anyhow::bail!("health check failed");
    }
    Ok(())
}

/// Checks that need a valid configuration; returns whether all passed
async fn check_environment(config: &Config, quiet: bool) -> anyhow::Result<bool> {
    use ontorag_core::config::EmbeddingProvider;

    let mut all_ok = true;

    // Embedding provider
    match config.embedding.provider {
        EmbeddingProvider::Hash => {
            if !quiet {
                println!(
                    "[OK] Embeddings: local hashing ({} dimensions)",
                    config.embedding.dimensions
                );
            }
        }
        EmbeddingProvider::Http => match config.embedding.resolved_api_key() {
            Ok(Some(_)) => {
                if !quiet {
                    let redacted = config.embedding.redacted_api_key()?.unwrap_or_default();
                    println!(
                        "[OK] Embeddings: {} via {} ({})",
                        config.embedding.model, config.embedding.base_url, redacted
                    );
                }
            }
            Ok(None) => {
                all_ok = false;
                if !quiet {
                    warn!("Embedding API key: Not configured");
                    println!("[!!] Embedding API key: Not configured");
                    println!("     Set ONTORAG_EMBEDDING_API_KEY or OPENAI_API_KEY environment variable");
                }
            }
            Err(e) => {
                all_ok = false;
                if !quiet {
                    println!("[!!] Embedding API key: Error - {}", e);
                }
            }
        },
    }

    if !quiet {
        match Config::config_path() {
            Ok(path) => {
                if path.exists() {
                    println!("[OK] Config file: {}", path.display());
                } else {
                    println!("[--] Config file: {} (using defaults)", path.display());
                }
            }
            Err(e) => {
                println!("[!!] Config file: Error - {}", e);
            }
        }

        let source = &config.ingest.source;
        if source.is_file() {
            println!("[OK] Ontology source: {}", source.display());
        } else {
            println!("[--] Ontology source: {} (not found)", source.display());
        }
    }

    match KnowledgeBase::open(config).await {
        Ok(kb) => {
            if !quiet {
                println!("[OK] Database: Connected");
                println!("     Path: {}", kb.database().path().display());

                match kb.database().migration_status().await {
                    Ok(status) => {
                        if status.needs_migration {
                            println!(
                                "[!!] Database: Migrations pending (v{} -> v{})",
                                status.current_version, status.target_version
                            );
                        } else {
                            println!("[OK] Database: Schema v{}", status.current_version);
                        }
                    }
                    Err(e) => {
                        println!("[!!] Database: Migration check failed - {}", e);
                    }
                }

                match kb.stats().await {
                    Ok(stats) if stats.entities == 0 => {
                        println!("[--] Knowledge base: empty (run `ontorag ingest`)");
                    }
                    Ok(stats) => {
                        println!(
                            "[OK] Knowledge base: {} entities, {} relationships, {} embeddings",
                            stats.entities, stats.relationships, stats.embeddings
                        );
                    }
                    Err(e) => {
                        println!("[!!] Knowledge base: {}", e);
                    }
                }
            }
            kb.close().await;
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Database: Failed to open - {}", e);
            }
        }
    }

    Ok(all_ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_parses_query_and_format() {
        let cli = Cli::try_parse_from(["ontorag", "--format", "json", "search", "R1"]).unwrap();
        assert!(cli.format == OutputFormat::Json);
        match cli.command {
            Commands::Search { query } => assert_eq!(query, "R1"),
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_ingest_path_is_optional() {
        let cli = Cli::try_parse_from(["ontorag", "ingest"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { path: None }));

        let cli = Cli::try_parse_from(["ontorag", "-q", "ingest", "onto.ttl"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Ingest { path } => assert_eq!(path, Some(PathBuf::from("onto.ttl"))),
            _ => panic!("expected ingest"),
        }
    }
}
