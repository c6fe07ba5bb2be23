use anyhow::Result;
use clap::Parser;
use live_scribe::enrich::{EnrichmentSettings, OpenAiCompletions};
use live_scribe::speech::{NatsRecognizer, SpeechSettings};
use live_scribe::{create_router, AppState, Config};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "live-scribe", about = "Live transcription and enrichment relay")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/live-scribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} starting", cfg.service.name);

    // Providers are built before the listener binds: missing credentials or
    // an unreachable recognizer fail fast, so no session can start half-set-up.
    let recognizer = Arc::new(
        NatsRecognizer::connect(
            &cfg.speech.nats_url,
            cfg.speech.sample_rate,
            cfg.speech.channels,
        )
        .await?,
    );
    let completions = Arc::new(OpenAiCompletions::new(
        cfg.enrichment.base_url.clone(),
        cfg.enrichment.model.clone(),
        &cfg.enrichment.api_key_env,
    )?);

    let state = AppState::new(
        recognizer,
        completions,
        SpeechSettings::from(&cfg.speech),
        EnrichmentSettings::from(&cfg.enrichment),
    );

    let router = create_router(state);
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
