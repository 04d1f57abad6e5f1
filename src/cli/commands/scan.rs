//! Library scan command.

use std::path::PathBuf;
use std::sync::Arc;

use crate::enrichment::TriggerReason;
use crate::library::{CatalogSync, ScanLock};
use crate::normalizer::TitleNormalizer;
use crate::scanner::FsObserver;

use super::enrich::{build_orchestrator, print_batch};
use super::{AppContext, cancel_on_ctrl_c};

/// Scan the library folders and reconcile the catalog
pub async fn cmd_scan(
    ctx: &AppContext,
    paths: Vec<PathBuf>,
    enrich: bool,
    token: Option<String>,
) -> anyhow::Result<()> {
    let paths = if paths.is_empty() {
        ctx.config.library.paths.clone()
    } else {
        paths
    };
    if paths.is_empty() {
        anyhow::bail!("No library paths given and none configured");
    }

    let normalizer = Arc::new(TitleNormalizer::new(&ctx.config.normalizer)?);
    let sync = CatalogSync::new(
        Arc::new(ctx.catalog.clone()),
        normalizer,
        ScanLock::new(),
        ctx.config.library.insert_batch_size,
    )
    .with_status(ctx.status.clone());
    let observer = Arc::new(FsObserver::new(
        paths.clone(),
        ctx.config.library.min_duration_ms,
    ));
    let cancel = cancel_on_ctrl_c();

    for path in &paths {
        println!("Scanning: {}", path.display());
    }
    let report = sync.run_scan(observer, &cancel).await?;

    println!();
    println!("Observed:  {}", report.observed);
    println!("Inserted:  {}", report.inserted);
    println!(
        "Updated:   {} ({} renormalized)",
        report.updated, report.renormalized
    );
    println!("Deleted:   {}", report.deleted);
    println!("Unchanged: {}", report.unchanged);
    if report.duplicates > 0 {
        println!("Duplicate files skipped: {}", report.duplicates);
    }
    if report.rejected > 0 {
        println!("Already cataloged, skipped: {}", report.rejected);
    }
    if report.unreadable > 0 {
        println!("Unreadable new files skipped: {}", report.unreadable);
    }
    let orphans = report.orphans;
    if orphans.artists + orphans.albums + orphans.genres > 0 {
        println!(
            "Removed orphans: {} artists, {} albums, {} genres",
            orphans.artists, orphans.albums, orphans.genres
        );
    }
    for failure in &report.failed_batches {
        eprintln!("Failed: {failure}");
    }
    if report.cancelled {
        println!("Scan cancelled; committed batches were kept.");
        return Ok(());
    }
    println!("Scan complete in {} ms.", report.elapsed_ms);

    if enrich {
        let Some(token) = ctx.token(token) else {
            eprintln!("Skipping enrichment: no Genius access token configured.");
            return Ok(());
        };
        println!();
        let (orchestrator, printer) = build_orchestrator(ctx, token)?;
        let result = orchestrator.run_triggered(TriggerReason::PostScan, &cancel).await;
        drop(orchestrator);
        let _ = printer.await;
        print_batch(&result?);
    }

    Ok(())
}
