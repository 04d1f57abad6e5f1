//! Enrichment: finding each catalog track on an external source and
//! attaching what it knows (lyrics, cover art).
//!
//! # Architecture
//!
//! - **Domain models** (`domain.rs`) - our types; external responses are
//!   converted into these
//! - **Genius** (`genius/`) - DTOs, adapters and the HTTP client
//! - **Traits** (`traits.rs`) - the [`ExternalSearch`] and [`AssetStore`]
//!   seams, with mocks for tests
//! - **Throttle** and **resolver** - rate-limited, filtered lookups
//! - **Pacing** - pure delay policies
//! - **Orchestrator** - the per-batch state machine
//!
//! ```ignore
//! let resolver = EntityResolver::new(Arc::new(GeniusClient::new(token)?), &config.resolver, "Unknown Artist")?;
//! let orchestrator = EnrichmentOrchestrator::new(catalog, Arc::new(resolver), covers, config.enrichment);
//! let result = orchestrator.run_triggered(TriggerReason::Manual, &cancel).await?;
//! ```

pub mod domain;
pub mod genius;
pub mod orchestrator;
pub mod pacing;
pub mod resolver;
pub mod throttle;
pub mod traits;

pub use domain::{EnrichmentError, MatchCandidate, TrackDetails, TriggerReason};
pub use orchestrator::{
    BatchError, BatchResult, EnrichmentOrchestrator, EnrichmentProgress, progress_stream,
};
pub use pacing::{PacingPolicy, RetryPolicy};
pub use resolver::{EntityResolver, Resolution};
pub use throttle::Throttle;
pub use traits::{AssetStore, ExternalSearch};
