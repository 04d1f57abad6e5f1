//! Enrichment batch command.

use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cover::CoverCache;
use crate::enrichment::genius::GeniusClient;
use crate::enrichment::{
    BatchResult, EnrichmentOrchestrator, EntityResolver, RetryPolicy, TriggerReason,
    progress_stream,
};

use super::{AppContext, cancel_on_ctrl_c};

/// Run one enrichment batch, with retries
pub async fn cmd_enrich(
    ctx: &AppContext,
    limit: Option<u32>,
    reason: TriggerReason,
    token: Option<String>,
) -> anyhow::Result<()> {
    let Some(token) = ctx.token(token) else {
        anyhow::bail!(
            "Genius access token required: pass --token or set GENIUS_ACCESS_TOKEN \
             (create one at https://genius.com/api-clients)"
        );
    };

    let cancel = cancel_on_ctrl_c();
    let (orchestrator, printer) = build_orchestrator(ctx, token)?;
    let result = match limit {
        Some(limit) => {
            let config = orchestrator.config();
            orchestrator
                .run_with_retries(
                    limit,
                    config.max_attempts,
                    RetryPolicy::from_config(config),
                    &cancel,
                )
                .await
        }
        None => orchestrator.run_triggered(reason, &cancel).await,
    };

    // Closing the progress channel lets the printer finish
    drop(orchestrator);
    let _ = printer.await;

    print_batch(&result?);
    Ok(())
}

/// Wire Genius, the cover cache and the catalog into an orchestrator whose
/// progress is printed by the returned task.
pub(crate) fn build_orchestrator(
    ctx: &AppContext,
    token: String,
) -> anyhow::Result<(EnrichmentOrchestrator, JoinHandle<()>)> {
    let client = GeniusClient::new(token)?;
    let resolver = EntityResolver::new(
        Arc::new(client),
        &ctx.config.resolver,
        ctx.config.normalizer.unknown_artist.clone(),
    )?;

    let (tx, rx) = mpsc::channel(32);
    let printer = tokio::spawn(async move {
        let mut progress = std::pin::pin!(progress_stream(rx));
        while let Some(p) = progress.next().await {
            print!("\r[{}/{}] {:<60}", p.current, p.total, truncate(&p.label, 60));
            let _ = std::io::stdout().flush();
        }
        println!();
    });

    let orchestrator = EnrichmentOrchestrator::new(
        Arc::new(ctx.catalog.clone()),
        Arc::new(resolver),
        Arc::new(CoverCache::default_location()?),
        ctx.config.enrichment.clone(),
    )
    .with_progress(tx)
    .with_status(ctx.status.clone());

    Ok((orchestrator, printer))
}

pub(crate) fn print_batch(result: &BatchResult) {
    println!("Enriched: {}", result.enriched);
    println!("Partial:  {}", result.partial);
    println!("Failed:   {}", result.failed);
    println!("Skipped:  {}", result.skipped);
    if result.cancelled {
        println!("Batch cancelled after {} ms.", result.total_time_ms);
    } else {
        println!("Batch complete in {} ms.", result.total_time_ms);
    }
}

fn truncate(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(max.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}
