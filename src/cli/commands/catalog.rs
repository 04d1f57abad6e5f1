//! Catalog inspection and maintenance commands.

use crate::catalog::Catalog;
use crate::model::ResetTarget;

use super::AppContext;

/// Print track counts per enrichment status
pub async fn cmd_status(ctx: &AppContext) -> anyhow::Result<()> {
    let summary = ctx.catalog.enrichment_summary().await?;
    println!("Tracks:    {}", summary.total());
    println!("Pending:   {}", summary.pending);
    println!("Resolving: {}", summary.resolving);
    println!("Enriched:  {}", summary.enriched);
    println!("Partial:   {}", summary.partial);
    println!("Failed:    {}", summary.failed);
    println!("Exhausted: {}", summary.exhausted);
    if summary.exhausted > 0 {
        println!();
        println!("Run `catalog-minder reset` to retry exhausted tracks.");
    }
    Ok(())
}

/// Reset tracks to pending
pub async fn cmd_reset(ctx: &AppContext, ids: Vec<i64>) -> anyhow::Result<()> {
    let target = if ids.is_empty() {
        ResetTarget::AllExhausted
    } else {
        ResetTarget::Ids(ids)
    };
    let count = ctx.catalog.reset_enrichment(target).await?;
    println!("Reset {count} track(s).");
    Ok(())
}

/// List the catalog, or print one track's lyrics
pub async fn cmd_list(ctx: &AppContext, lyrics: Option<i64>) -> anyhow::Result<()> {
    if let Some(id) = lyrics {
        match ctx.catalog.lyrics_for(id).await? {
            Some(text) => println!("{text}"),
            None => eprintln!("No lyrics stored for track {id}."),
        }
        return Ok(());
    }

    for track in ctx.catalog.all_tracks().await? {
        let version = track
            .version_tag
            .as_deref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        println!(
            "{:>6}  {} - {}{}  [{}]",
            track.id, track.artist, track.title, version, track.enrichment_status
        );
    }
    Ok(())
}
