use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context};
use serde::Serialize;

use crate::{
    configuration::{
        CatalogSettings, CrawlJobSettings, RetrySettings, Settings, UniverseSource, WaitSettings,
    },
    dal::{
        count_db::CountLedger,
        download_log_db::DownloadLog,
        processed_log_db::ProcessedLog,
        table_db::{csv_files_in, dump_failure, read_targets, write_registry, write_result_set},
        PROCESSED_LOG_FILE, RECORD_COUNTS_FILE,
    },
    domain::{
        column_matcher::ColumnMatcher,
        result_row::{CrawlStatus, TargetResultSet},
        target::{Outcome, Target},
    },
    error::CrawlError,
    services::{
        aggregate,
        interaction::wait_for,
        pending, ArtifactValidator, Cataloguer, Crawler, Droid, DroidFactory, PdfValidator,
        SessionDriver, SessionFactory,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    County,
    Zipcode,
    Aggregate,
    Download,
}

impl FromStr for Job {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "county" => Ok(Job::County),
            "zipcode" => Ok(Job::Zipcode),
            "aggregate" => Ok(Job::Aggregate),
            "download" => Ok(Job::Download),
            other => Err(anyhow!(
                "Unknown job '{}'. Use one of: county, zipcode, aggregate, download",
                other
            )),
        }
    }
}

/// Totals for one run, logged when the job finishes.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub pending: usize,
    pub completed: usize,
    pub partial: usize,
    pub no_results: usize,
    pub indeterminate: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rows: usize,
    pub downloaded: usize,
    pub identifiers: usize,
}

impl RunSummary {
    fn tally(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed | Outcome::Migrated => self.completed += 1,
            Outcome::Partial => self.partial += 1,
            Outcome::NoResults => self.no_results += 1,
            Outcome::Indeterminate => self.indeterminate += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

pub async fn run(job: Job, settings: Settings) -> anyhow::Result<RunSummary> {
    log::info!("Starting {:?} job", job);
    match job {
        Job::County => run_crawl_job(&settings, &settings.county).await,
        Job::Zipcode => run_crawl_job(&settings, &settings.zipcode).await,
        Job::Aggregate => run_aggregate_job(&settings),
        Job::Download => run_download_job(&settings).await,
    }
}

async fn run_crawl_job(settings: &Settings, job: &CrawlJobSettings) -> anyhow::Result<RunSummary> {
    let output_dir = settings.data_path(&job.output_dir);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let droid = Droid::new(&settings.webdriver, None)
        .await
        .context("Failed to start browser session")?;

    let result = match load_universe(&droid, settings, job).await {
        Ok(universe) => {
            crawl_targets(
                &droid,
                job,
                &settings.waits,
                &settings.retries,
                &universe,
                &output_dir,
            )
            .await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = droid.quit().await {
        log::warn!("Failed to close browser session: {}", e);
    }
    result
}

/// Everything the job should visit, in site or file order.
pub async fn load_universe<D: SessionDriver>(
    driver: &D,
    settings: &Settings,
    job: &CrawlJobSettings,
) -> anyhow::Result<Vec<Target>> {
    let targets = match &job.universe {
        UniverseSource::Dropdown { field } => {
            dropdown_targets(driver, job, field, &settings.waits).await?
        }
        UniverseSource::Csv { path, column } => {
            let path = settings.data_path(path);
            read_targets(&path, &ColumnMatcher::named(column))
                .with_context(|| format!("Failed to read targets from {:?}", path))?
        }
    };

    log::info!("Loaded {} targets", targets.len());
    Ok(targets)
}

/// Options of a dropdown on the search form, blank placeholder values skipped.
pub async fn dropdown_targets<D: SessionDriver>(
    driver: &D,
    job: &CrawlJobSettings,
    field: &str,
    waits: &WaitSettings,
) -> anyhow::Result<Vec<Target>> {
    let url = job.site.form_url()?;
    driver.navigate(url.as_str()).await?;

    let locator = job.site.locators.get(field)?;
    if wait_for(driver, locator, waits).await.is_none() {
        return Err(anyhow!("Target dropdown '{}' not found on {}", field, url));
    }

    let mut targets: Vec<Target> = vec![];
    for option in driver.options(locator).await? {
        if option.value.trim().is_empty() || option.text.trim().is_empty() {
            continue;
        }
        let target = Target::new(option.text);
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    Ok(targets)
}

/// Crawls every pending target, saving rows, record counts and the processed
/// log after each one. A failing target is logged and the run moves on.
pub async fn crawl_targets<D: SessionDriver>(
    driver: &D,
    job: &CrawlJobSettings,
    waits: &WaitSettings,
    retries: &RetrySettings,
    universe: &[Target],
    output_dir: &Path,
) -> anyhow::Result<RunSummary> {
    let mut processed = ProcessedLog::open(&output_dir.join(PROCESSED_LOG_FILE))?;
    if job.migrate_from_outputs {
        processed.migrate_from_outputs(output_dir, universe)?;
    }
    let mut counts = CountLedger::open(
        &output_dir.join(RECORD_COUNTS_FILE),
        &job.target_column,
        "number_of_records",
    )?;

    let todo = pending(universe, &processed.targets(), job.resume_from.as_deref());
    log::info!(
        "{} of {} targets pending ({} already processed)",
        todo.len(),
        universe.len(),
        processed.count()
    );

    let mut summary = RunSummary {
        pending: todo.len(),
        ..Default::default()
    };
    let crawler = Crawler::new(driver, &job.site, waits, retries);

    for (i, target) in todo.iter().enumerate() {
        log::info!("[{}/{}] Processing {}", i + 1, todo.len(), target);

        let outcome = match crawl_target(&crawler, target, retries.indeterminate).await {
            Ok(set) => match write_result_set(output_dir, &set, &job.target_column) {
                Ok(_) => {
                    if set.status != CrawlStatus::Indeterminate {
                        counts.set(target.value(), set.count());
                    }
                    summary.rows += set.count();
                    set.outcome()
                }
                Err(e) => {
                    log::error!("Failed to save rows for {}: {}", target, e);
                    counts.set(target.value(), 0);
                    Outcome::Failed
                }
            },
            Err(e) => {
                report_failure(output_dir, &e);
                counts.set(target.value(), 0);
                Outcome::Failed
            }
        };

        if let Err(e) = counts.save() {
            log::error!("Failed to save record counts after {}: {}", target, e);
        }
        if let Err(e) = processed.record(target, outcome) {
            log::error!("Failed to log {} as {:?}: {}", target, outcome, e);
        }
        summary.tally(outcome);
    }

    Ok(summary)
}

/// Repeats a search that came back indeterminate up to `extra_attempts` times.
async fn crawl_target<D: SessionDriver>(
    crawler: &Crawler<'_, D>,
    target: &Target,
    extra_attempts: u8,
) -> Result<TargetResultSet, CrawlError> {
    let mut attempt = 0;
    loop {
        let set = crawler.crawl(target).await?;
        if set.status != CrawlStatus::Indeterminate || attempt >= extra_attempts {
            return Ok(set);
        }
        attempt += 1;
        log::warn!(
            "Retrying {} after an indeterminate search ({}/{})",
            target,
            attempt,
            extra_attempts
        );
    }
}

fn report_failure(dir: &Path, error: &CrawlError) {
    log::error!("{}", error);
    if let Err(e) = dump_failure(dir, error) {
        log::warn!("Could not save page source for {}: {}", error.target, e);
    }
}

fn run_aggregate_job(settings: &Settings) -> anyhow::Result<RunSummary> {
    let dirs: Vec<PathBuf> = settings
        .aggregate
        .input_dirs
        .iter()
        .map(|d| settings.data_path(d))
        .collect();
    let files = csv_files_in(&dirs)?;
    let identifiers = aggregate(
        &files,
        &ColumnMatcher::Contains(settings.aggregate.column_contains.clone()),
    );

    let registry = settings.data_path(&settings.aggregate.registry_file);
    if let Some(parent) = registry.parent() {
        fs::create_dir_all(parent)?;
    }
    write_registry(&registry, &identifiers)
        .with_context(|| format!("Failed to write registry {:?}", registry))?;
    log::info!("Saved {} identifiers to {:?}", identifiers.len(), registry);

    Ok(RunSummary {
        identifiers: identifiers.len(),
        ..Default::default()
    })
}

async fn run_download_job(settings: &Settings) -> anyhow::Result<RunSummary> {
    let catalog = &settings.catalog;
    let data_root = &settings.application.data_root;
    for dir in [&catalog.pdf_dir, &catalog.scratch_dir] {
        let dir = settings.data_path(dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    let registry = settings.data_path(&catalog.registry_file);
    let identifiers = read_targets(&registry, &ColumnMatcher::rn_number())
        .with_context(|| format!("Failed to read identifiers from {:?}", registry))?;

    let factory = DroidFactory::new(settings.webdriver.clone());
    let cataloguer = Cataloguer::new(
        &factory,
        catalog,
        data_root,
        &settings.waits,
        &settings.retries,
        PdfValidator,
    );
    catalogue_targets(&cataloguer, &identifiers, catalog, data_root).await
}

/// Downloads documents for every identifier not yet in the download log,
/// keeping cumulative per-identifier counts.
pub async fn catalogue_targets<F: SessionFactory, V: ArtifactValidator>(
    cataloguer: &Cataloguer<'_, F, V>,
    identifiers: &[Target],
    catalog: &CatalogSettings,
    data_root: &Path,
) -> anyhow::Result<RunSummary> {
    let mut download_log = DownloadLog::open(&data_root.join(&catalog.download_log))?;
    let mut counts = CountLedger::open(
        &data_root.join(&catalog.download_counts),
        "rn_number",
        "download_counts",
    )?;
    let error_dir = data_root.join(&catalog.scratch_dir);

    let mut summary = RunSummary {
        pending: identifiers.len(),
        ..Default::default()
    };

    for (i, identifier) in identifiers.iter().enumerate() {
        if !catalog.redownload_logged && download_log.contains(identifier.value()) {
            log::info!("Skipping already logged RN: {}", identifier);
            summary.skipped += 1;
            continue;
        }
        log::info!("[{}/{}] Processing RN: {}", i + 1, identifiers.len(), identifier);

        match cataloguer.catalogue(identifier, &mut download_log).await {
            Ok(report) => {
                let total = counts.add(identifier.value(), report.downloaded);
                counts.save()?;
                log::info!(
                    "{}: {} new documents, {} in total",
                    identifier,
                    report.downloaded,
                    total
                );
                summary.downloaded += report.downloaded;
                summary.tally(match report.status {
                    CrawlStatus::Complete => Outcome::Completed,
                    CrawlStatus::Partial(_) => Outcome::Partial,
                    CrawlStatus::NoResults => Outcome::NoResults,
                    CrawlStatus::Indeterminate => Outcome::Indeterminate,
                });
            }
            Err(e) => {
                report_failure(&error_dir, &e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
