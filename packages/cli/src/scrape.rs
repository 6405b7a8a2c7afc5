//! The `scrape` command.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use county_facts_cli_utils::{IndicatifProgress, MultiProgress};
use county_facts_place_models::{AttributeSchema, PLACE_COLUMN, Place, REGION_COLUMN};
use county_facts_scraper::{
    BatchReport, BatchSummary, CacheConfig, DEFAULT_BASE_URL, FetchOrchestrator, PlaceOutcome,
    ScrapeConfig,
};
use futures::{Stream, StreamExt as _};
use county_facts_store::RecordStore;
use county_facts_store::input::{InputColumns, read_places};

/// Default demographics table.
pub const DEFAULT_OUTPUT: &str = "data/demographics.csv";

/// Default response cache directory.
pub const DEFAULT_CACHE_DIR: &str = "data/cache/quickfacts";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_CHECKPOINT_EVERY: usize = 50;

#[derive(Debug, Clone, clap::Args)]
pub struct ScrapeArgs {
    /// Election CSV listing the counties to scrape
    pub input: PathBuf,
    /// Demographics CSV to write
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
    /// Load existing records from the output file before scraping
    #[arg(long)]
    pub resume: bool,
    /// With --resume, do not refetch counties already in the output file
    #[arg(long, requires = "resume")]
    pub skip_existing: bool,
    /// Maximum number of counties to fetch (for testing)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Rewrite the output file after this many newly scraped counties
    #[arg(long, default_value_t = DEFAULT_CHECKPOINT_EVERY)]
    pub checkpoint_every: usize,
    /// QuickFacts base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Retries for transient failures (timeouts, 429, 5xx)
    #[arg(long, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,
    /// Minimum delay between requests in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
    /// Response cache directory
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,
    /// Send every request to the network
    #[arg(long)]
    pub no_cache: bool,
    /// Refetch cached pages older than this many days
    #[arg(long)]
    pub max_cache_age_days: Option<u32>,
    /// Input column holding the state name
    #[arg(long, default_value = REGION_COLUMN)]
    pub region_column: String,
    /// Input column holding the county name
    #[arg(long, default_value = PLACE_COLUMN)]
    pub place_column: String,
}

impl ScrapeArgs {
    /// Arguments for `input` with every option at its default.
    #[must_use]
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            output: PathBuf::from(DEFAULT_OUTPUT),
            resume: false,
            skip_existing: false,
            limit: None,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            delay_ms: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            no_cache: false,
            max_cache_age_days: None,
            region_column: REGION_COLUMN.to_owned(),
            place_column: PLACE_COLUMN.to_owned(),
        }
    }

    fn columns(&self) -> InputColumns {
        InputColumns {
            region: self.region_column.clone(),
            place: self.place_column.clone(),
        }
    }

    fn config(&self) -> ScrapeConfig {
        let mut config = ScrapeConfig::new(&self.base_url)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_retries(self.retries);

        if let Some(delay_ms) = self.delay_ms {
            config = config.with_delay_ms(delay_ms);
        }

        if !self.no_cache {
            let mut cache = CacheConfig::new(&self.cache_dir);
            if let Some(days) = self.max_cache_age_days {
                cache = cache.with_max_age(chrono::Duration::days(i64::from(days)));
            }
            config = config.with_cache(cache);
        }

        config
    }
}

/// Scrapes every county in `args.input` and writes the table to
/// `args.output`.
///
/// The table is rewritten every `args.checkpoint_every` scraped counties.
/// On Ctrl-C the county in flight is abandoned and the completed ones are
/// written out. The table is exported even when closing the transport
/// fails, so records fetched before the error are kept.
///
/// # Errors
///
/// Returns an error if the input or an existing output cannot be read, the
/// transport cannot be built, or the output cannot be written.
pub async fn run(
    args: &ScrapeArgs,
    multi: &MultiProgress,
) -> Result<BatchSummary, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let schema = AttributeSchema::quickfacts();

    let places = read_places(&args.input, &args.columns())?;

    let mut store = if args.resume && args.output.exists() {
        let store = RecordStore::open(&args.output, schema.clone())?;
        log::info!(
            "Resuming with {} record(s) from {}",
            store.len(),
            args.output.display()
        );
        store
    } else {
        RecordStore::new(schema.clone())
    };

    let places = select_places(places, &store, args.skip_existing, args.limit);

    let config = args.config();
    let transport = config.build_transport()?;
    let orchestrator = FetchOrchestrator::new(transport, schema, &config.base_url)?
        .with_progress(IndicatifProgress::places_bar(multi, "Scraping"))
        .with_checkpoint(&args.output, args.checkpoint_every);

    let (report, interrupted) =
        collect_until(orchestrator.run(&places, &mut store), ctrl_c()).await;
    let closed = orchestrator.close();

    let written = store.export(&args.output)?;
    log::info!(
        "Wrote {written} record(s) to {} in {:.1}s",
        args.output.display(),
        start.elapsed().as_secs_f64()
    );
    closed?;

    if interrupted {
        log::warn!(
            "Stopped after {} of {} county(ies); run again with --resume --skip-existing to continue",
            report.summary.total,
            places.len()
        );
    }

    let failed: Vec<&Place> = report
        .outcomes
        .iter()
        .filter(|o| o.outcome.is_failed())
        .map(|o| &o.place)
        .collect();
    if !failed.is_empty() {
        log::warn!(
            "{} county(ies) could not be fetched; run again with --resume --skip-existing to retry: {}",
            failed.len(),
            failed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        );
    }

    Ok(report.summary)
}

/// Resolves on the first Ctrl-C. Never resolves if the signal handler
/// cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Collects `outcomes` until the stream ends or `interrupt` resolves.
///
/// Returns the outcomes gathered so far and whether `interrupt` cut the
/// batch short.
async fn collect_until<S, F>(outcomes: S, interrupt: F) -> (BatchReport, bool)
where
    S: Stream<Item = PlaceOutcome>,
    F: Future<Output = ()>,
{
    let mut outcomes = std::pin::pin!(outcomes);
    let mut interrupt = std::pin::pin!(interrupt);
    let mut report = BatchReport::default();

    loop {
        tokio::select! {
            biased;
            () = &mut interrupt => {
                log::warn!("Interrupted; saving {} completed county(ies)", report.summary.extracted);
                return (report, true);
            }
            next = outcomes.next() => match next {
                Some(outcome) => {
                    report.summary.record(&outcome.outcome);
                    report.outcomes.push(outcome);
                }
                None => return (report, false),
            },
        }
    }
}

/// Drops places already in `store` when `skip_existing` is set, then
/// applies `limit`.
fn select_places(
    places: Vec<Place>,
    store: &RecordStore,
    skip_existing: bool,
    limit: Option<usize>,
) -> Vec<Place> {
    let mut places = if skip_existing {
        let before = places.len();
        let remaining: Vec<Place> = places
            .into_iter()
            .filter(|place| !store.contains(place))
            .collect();
        log::info!(
            "Skipping {} county(ies) already in the table",
            before - remaining.len()
        );
        remaining
    } else {
        places
    };

    if let Some(limit) = limit {
        places.truncate(limit);
    }

    places
}

#[cfg(test)]
mod tests {
    use super::*;
    use county_facts_cli_utils::ProgressDrawTarget;
    use county_facts_place_models::AttributeSet;
    use county_facts_scraper::Outcome;
    use county_facts_store::Upserted;

    fn stored(places: &[Place]) -> RecordStore {
        let schema = AttributeSchema::quickfacts();
        let mut store = RecordStore::new(schema.clone());
        for place in places {
            let attributes: AttributeSet = schema.names().map(|name| (name, 1.0)).collect();
            store.upsert(place.clone(), attributes).unwrap();
        }
        store
    }

    fn places() -> Vec<Place> {
        vec![
            Place::new("Alabama", "Autauga"),
            Place::new("Alabama", "Baldwin"),
            Place::new("Alabama", "Barbour"),
        ]
    }

    #[test]
    fn select_keeps_everything_by_default() {
        let store = stored(&[Place::new("Alabama", "Baldwin")]);
        assert_eq!(select_places(places(), &store, false, None), places());
    }

    #[test]
    fn select_skips_existing_then_limits() {
        let store = stored(&[Place::new("Alabama", "Autauga")]);
        assert_eq!(
            select_places(places(), &store, true, Some(1)),
            vec![Place::new("Alabama", "Baldwin")]
        );
    }

    fn extracted(places: &[Place]) -> Vec<PlaceOutcome> {
        places
            .iter()
            .map(|place| PlaceOutcome {
                place: place.clone(),
                outcome: Outcome::Extracted(Upserted::Inserted),
            })
            .collect()
    }

    #[tokio::test]
    async fn collect_until_drains_an_uninterrupted_batch() {
        let outcomes = futures::stream::iter(extracted(&places()));

        let (report, interrupted) = collect_until(outcomes, std::future::pending()).await;

        assert!(!interrupted);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.extracted, 3);
        let order: Vec<Place> = report.outcomes.into_iter().map(|o| o.place).collect();
        assert_eq!(order, places());
    }

    #[tokio::test]
    async fn collect_until_stops_when_interrupted() {
        let outcomes = futures::stream::iter(extracted(&places()));

        let (report, interrupted) = collect_until(outcomes, std::future::ready(())).await;

        assert!(interrupted);
        assert_eq!(report.summary.total, 0);
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn config_reflects_flags() {
        let mut args = ScrapeArgs::new(PathBuf::from("votes.csv"));
        args.timeout_secs = 5;
        args.retries = 0;
        args.delay_ms = Some(200);
        args.max_cache_age_days = Some(7);

        let config = args.config();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.delay_ms, Some(200));
        let cache = config.cache.unwrap();
        assert_eq!(cache.dir, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(cache.max_age, Some(chrono::Duration::days(7)));
    }

    #[test]
    fn no_cache_disables_the_cache() {
        let mut args = ScrapeArgs::new(PathBuf::from("votes.csv"));
        args.no_cache = true;
        assert!(args.config().cache.is_none());
    }

    #[tokio::test]
    async fn unsupported_only_batch_writes_an_empty_table() {
        let dir = std::env::temp_dir().join("county_facts_cli_scrape_alaska");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let input = dir.join("votes.csv");
        std::fs::write(&input, "state,county,votes\nAlaska,District 1,100\n").unwrap();

        let mut args = ScrapeArgs::new(input);
        args.output = dir.join("out").join("demographics.csv");
        args.no_cache = true;

        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let summary = run(&args, &multi).await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.skipped, 1);
        let written = std::fs::read_to_string(&args.output).unwrap();
        assert_eq!(
            written.trim_end(),
            AttributeSchema::quickfacts().header().join(",")
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
