//! Ferrumyx — biomedical literature enrichment pipeline.
//! Entry point for the driver binary (C13).

mod cli;
mod corpus;
mod driver;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ferrumyx_common::error::FerrumyxError;
use ferrumyx_pipeline::config::AppConfig;
use ferrumyx_pipeline::embedder::DeterministicHashEmbedder;
use ferrumyx_pipeline::graph::GraphWriter;
use ferrumyx_pipeline::llm::{HostedBackend, LlmBackend, LocalBackend};
use ferrumyx_pipeline::standardizer::HttpMedicalNerClient;
use ferrumyx_pipeline::synonyms::UmlsResolver;

use crate::cli::Cli;
use crate::corpus::{scan_corpus, single_document};
use crate::driver::{Driver, DriverConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ferrumyx=debug,info")))
        .init();

    info!("ferrumyx starting up");
    info!(version = env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(err) => {
            // Only an Initialization error may propagate out of main.
            eprintln!("fatal initialization error: {err}");
            return Err(err.into());
        }
    };

    info!("connecting to the graph store and the UMLS mirror");
    let graph_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.store.graph_database_url)
        .await
        .map_err(FerrumyxError::Database)?;

    let umls_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.store.umls_database_url)
        .await
        .map_err(FerrumyxError::Database)?;

    info!("running schema migrations");
    sqlx::migrate!("../../migrations").run(&graph_pool).await.map_err(|e| anyhow::anyhow!("migration failed: {e}"))?;

    let use_local = cli.use_lm_studio;
    let llm_backend: Box<dyn LlmBackend> = if use_local {
        let url = cli.lm_studio_url.clone().unwrap_or_else(|| "http://localhost:1234".to_string());
        info!(url = %url, "using local LM Studio backend");
        Box::new(LocalBackend::new(url, config.llm.hosted_model.clone()))
    } else {
        info!(model = %config.llm.hosted_model, "using hosted LLM backend");
        Box::new(HostedBackend::new(config.llm.hosted_base_url.clone(), config.llm.hosted_model.clone(), config.llm.hosted_api_key.clone()))
    };

    let ner_client: Arc<dyn ferrumyx_pipeline::standardizer::MedicalNerClient> = Arc::new(HttpMedicalNerClient::new(
        config.medical_ner.snomed_url.clone(),
        config.medical_ner.rxnorm_url.clone(),
        config.medical_ner.api_key.clone(),
    ));

    let umls = UmlsResolver::new(umls_pool);
    let embedder = DeterministicHashEmbedder::default();
    let graph = GraphWriter::new(graph_pool);

    let documents = if let Some(path) = &cli.single_document {
        single_document(path).into_iter().collect::<Vec<_>>()
    } else {
        scan_corpus(Path::new(&cli.data_directory)).await?
    };

    info!(count = documents.len(), "planned document list");

    let driver_config = DriverConfig {
        batch_size: cli.batch_size,
        test_mode: cli.is_test_mode(),
        checkpoint_path: "checkpoint.json".to_string(),
        sink_output_dir: "output".to_string(),
    };

    let driver = Driver {
        config: driver_config,
        llm_backend: llm_backend.as_ref(),
        ner_client,
        umls: &umls,
        embedder: &embedder,
        graph: &graph,
    };

    driver.run(documents, cli.resume, cli.start_chunk).await?;

    info!("ferrumyx finished");
    Ok(())
}
