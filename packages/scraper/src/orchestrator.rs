//! Batch scraping over a list of places.
//!
//! Each place moves through `resolve -> fetch -> extract -> upsert` and
//! ends in exactly one [`Outcome`]. Only the `Extracted` outcome touches
//! the store. Places are processed one at a time in input order, so the
//! outcome stream and the store's insertion order both follow the input.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::stream;
use county_facts_place_models::{AttributeSchema, Place};
use county_facts_resolver::{PageToken, ResolveError};
use county_facts_store::{RecordStore, StoreError, Upserted};
use futures::{Stream, StreamExt as _};

use crate::ScrapeError;
use crate::extract::{ExtractionError, PageExtractor};
use crate::progress::{ProgressCallback, null_progress};
use crate::transport::{FetchError, Transport};

/// Why a place produced no record.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    /// The place lies in a state whose subdivisions are not modeled.
    #[error(transparent)]
    UnsupportedRegion(#[from] ResolveError),

    /// The resolved page does not exist.
    #[error("No QuickFacts page at {url}")]
    NotFound {
        /// URL that returned 404.
        url: String,
    },

    /// The page was fetched but an attribute could not be read.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The store refused the extracted attributes.
    #[error(transparent)]
    Rejected(#[from] StoreError),
}

/// Terminal state of one place in a batch.
#[derive(Debug)]
pub enum Outcome {
    /// Attributes were extracted and written to the store.
    Extracted(Upserted),
    /// The place was passed over; the batch continued.
    Skipped(SkipReason),
    /// The page could not be fetched. Worth retrying in a later run.
    Failed(FetchError),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Extracted`].
    #[must_use]
    pub const fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }

    /// Returns `true` for [`Outcome::Skipped`].
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Returns `true` for [`Outcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One place and what happened to it.
#[derive(Debug)]
pub struct PlaceOutcome {
    /// The place, as given in the input.
    pub place: Place,
    /// Its terminal state.
    pub outcome: Outcome,
}

/// Outcome counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Places processed.
    pub total: usize,
    /// Places written to the store.
    pub extracted: usize,
    /// Places skipped (unsupported, not found, unextractable, rejected).
    pub skipped: usize,
    /// Places whose fetch failed.
    pub failed: usize,
}

impl BatchSummary {
    /// Counts one outcome.
    pub const fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Extracted(_) => self.extracted += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resolved {} of {} places ({} skipped, {} failed)",
            self.extracted, self.total, self.skipped, self.failed
        )
    }
}

/// Everything a completed batch produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Outcome counts.
    pub summary: BatchSummary,
    /// One entry per input place, in input order.
    pub outcomes: Vec<PlaceOutcome>,
}

/// Where and how often a running batch snapshots its progress.
#[derive(Debug, Clone)]
struct Checkpoint {
    path: PathBuf,
    every: usize,
}

/// Drives resolve, fetch, extract and upsert for a batch of places.
pub struct FetchOrchestrator<T: Transport> {
    transport: T,
    extractor: PageExtractor,
    base_url: String,
    progress: Arc<dyn ProgressCallback>,
    checkpoint: Option<Checkpoint>,
}

impl<T: Transport> FetchOrchestrator<T> {
    /// Creates an orchestrator that fetches `<base_url>/<token>` pages
    /// through `transport` and extracts `schema`'s attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Extraction`] if a schema mnemonic does not
    /// form a valid selector.
    pub fn new(transport: T, schema: AttributeSchema, base_url: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            transport,
            extractor: PageExtractor::new(schema)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            progress: null_progress(),
            checkpoint: None,
        })
    }

    /// Reports batch progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Exports the store to `path` and checkpoints the transport after
    /// every `every` extracted places, so an interrupted batch keeps its
    /// work. An `every` of zero is treated as one.
    #[must_use]
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>, every: usize) -> Self {
        self.checkpoint = Some(Checkpoint {
            path: path.into(),
            every: every.max(1),
        });
        self
    }

    /// The transport pages are fetched through.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Page URL for `token`.
    #[must_use]
    pub fn url_for(&self, token: &PageToken) -> String {
        format!("{}/{token}", self.base_url)
    }

    /// Runs one place through the pipeline.
    ///
    /// The store is only modified when the outcome is
    /// [`Outcome::Extracted`].
    pub async fn fetch_place(&self, place: &Place, store: &mut RecordStore) -> Outcome {
        let token = match county_facts_resolver::resolve(place) {
            Ok(token) => token,
            Err(e) => {
                log::warn!("Skipping {place}: {e}");
                return Outcome::Skipped(e.into());
            }
        };

        let url = self.url_for(&token);
        log::debug!("Fetching {place} from {url}");

        let html = match self.transport.fetch(&url).await {
            Ok(html) => html,
            Err(FetchError::NotFound { url }) => {
                log::warn!("Skipping {place}: no page at {url}");
                return Outcome::Skipped(SkipReason::NotFound { url });
            }
            Err(e) => {
                log::error!("Failed to fetch {place}: {e}");
                return Outcome::Failed(e);
            }
        };

        let attributes = match self.extractor.extract(&html, place) {
            Ok(attributes) => attributes,
            Err(e) => {
                log::warn!("Skipping {place}: {e}");
                return Outcome::Skipped(e.into());
            }
        };

        match store.upsert(place.clone(), attributes) {
            Ok(upserted) => {
                log::debug!("{upserted:?} {place}");
                Outcome::Extracted(upserted)
            }
            Err(e) => {
                log::warn!("Skipping {place}: {e}");
                Outcome::Skipped(e.into())
            }
        }
    }

    /// Snapshots `store` and the transport. Failures are logged, not
    /// returned: a missed checkpoint must not end the batch.
    fn save_checkpoint(&self, path: &Path, store: &RecordStore) {
        match store.export(path) {
            Ok(rows) => log::debug!("Checkpointed {rows} record(s) to {}", path.display()),
            Err(e) => log::warn!("Checkpoint to {} failed: {e}", path.display()),
        }
        if let Err(e) = self.transport.checkpoint() {
            log::warn!("Transport checkpoint failed: {e}");
        }
    }

    /// Processes `places` in order, yielding one outcome per place as it
    /// completes.
    ///
    /// Nothing happens until the stream is polled. Dropping it early
    /// leaves `store` holding the records of the places already yielded.
    /// With [`Self::with_checkpoint`], the store is also exported before
    /// the outcome that completes each checkpoint interval is yielded.
    pub fn run<'a>(
        &'a self,
        places: &'a [Place],
        store: &'a mut RecordStore,
    ) -> impl Stream<Item = PlaceOutcome> + 'a {
        stream! {
            let total = places.len();
            self.progress.set_total(total as u64);
            log::info!("Scraping {total} place(s)");

            let mut summary = BatchSummary::default();
            let mut since_checkpoint = 0_usize;
            for place in places {
                self.progress.set_message(place.to_string());
                let outcome = self.fetch_place(place, store).await;
                summary.record(&outcome);
                self.progress.inc(1);

                if let (Some(checkpoint), true) = (&self.checkpoint, outcome.is_extracted()) {
                    since_checkpoint += 1;
                    if since_checkpoint >= checkpoint.every {
                        self.save_checkpoint(&checkpoint.path, store);
                        since_checkpoint = 0;
                    }
                }

                yield PlaceOutcome {
                    place: place.clone(),
                    outcome,
                };
            }

            log::info!("{summary}");
            self.progress.finish(summary.to_string());
        }
    }

    /// Runs the whole batch and collects every outcome.
    pub async fn run_to_end(&self, places: &[Place], store: &mut RecordStore) -> BatchReport {
        let mut report = BatchReport {
            summary: BatchSummary::default(),
            outcomes: Vec::with_capacity(places.len()),
        };

        let outcomes = self.run(places, store);
        let mut outcomes = std::pin::pin!(outcomes);
        while let Some(outcome) = outcomes.next().await {
            report.summary.record(&outcome.outcome);
            report.outcomes.push(outcome);
        }

        report
    }

    /// Releases the transport, flushing any response cache.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the transport cannot persist its state.
    pub fn close(mut self) -> Result<(), FetchError> {
        self.transport.close()
    }
}
