use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tokio::time::{sleep, Instant};

use crate::{
    configuration::{CatalogColumns, CatalogSettings, RetrySettings, SiteProfile, WaitSettings},
    dal::download_log_db::DownloadLog,
    domain::{
        download_record::DownloadRecord,
        locator::Locator,
        result_row::{CrawlStatus, ResultRow},
        target::Target,
    },
    error::{CrawlError, Result, ScrapeError},
    services::{
        crawler::{Crawler, PageSink},
        droid::{SessionDriver, SessionFactory},
        interaction::click_with_retries,
        validator::ArtifactValidator,
    },
};

/// Browser partial-download suffixes; such files are still being written.
const PARTIAL_SUFFIXES: [&str; 3] = ["crdownload", "part", "tmp"];

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogReport {
    pub status: CrawlStatus,
    pub pages: usize,
    pub attempts: usize,
    pub downloaded: usize,
    pub failures: usize,
}

/// Finds and stores every document of one category for an identifier.
pub struct Cataloguer<'a, F: SessionFactory, V: ArtifactValidator> {
    factory: &'a F,
    site: &'a SiteProfile,
    waits: &'a WaitSettings,
    retries: &'a RetrySettings,
    document_type: &'a str,
    columns: CatalogColumns,
    pdf_dir: PathBuf,
    scratch_dir: PathBuf,
    validator: V,
}

impl<'a, F: SessionFactory, V: ArtifactValidator> Cataloguer<'a, F, V> {
    pub fn new(
        factory: &'a F,
        catalog: &'a CatalogSettings,
        data_root: &Path,
        waits: &'a WaitSettings,
        retries: &'a RetrySettings,
        validator: V,
    ) -> Self {
        Cataloguer {
            factory,
            site: &catalog.site,
            waits,
            retries,
            document_type: catalog.document_type.as_str(),
            columns: catalog.columns,
            pdf_dir: data_root.join(&catalog.pdf_dir),
            scratch_dir: data_root.join(&catalog.scratch_dir),
            validator,
        }
    }

    /// One browser session with its own throwaway download directory per
    /// identifier. Only a failed search is an error.
    pub async fn catalogue(
        &self,
        target: &Target,
        log: &mut DownloadLog,
    ) -> std::result::Result<CatalogReport, CrawlError> {
        let scoped = |source: ScrapeError| CrawlError {
            target: target.value().to_string(),
            source,
            page_source: None,
        };

        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}_", target.file_stem()))
            .tempdir_in(&self.scratch_dir)
            .map_err(|e| scoped(e.into()))?;
        let driver = self.factory.open(scratch.path()).await.map_err(scoped)?;

        let mut sink = DownloadSink {
            download_dir: scratch.path(),
            pdf_dir: &self.pdf_dir,
            document_type: self.document_type,
            columns: self.columns,
            waits: self.waits,
            retries: self.retries,
            validator: &self.validator,
            log,
            attempts: 0,
            downloaded: 0,
            failures: 0,
        };

        let crawl = Crawler::new(&driver, self.site, self.waits, self.retries)
            .require_columns(self.columns.required())
            .crawl_with(target, &mut sink)
            .await;
        self.factory.close(driver).await;
        let set = crawl?;

        log::info!(
            "[{}] {} of {} {} documents stored",
            target,
            sink.downloaded,
            sink.attempts,
            self.document_type
        );
        Ok(CatalogReport {
            status: set.status,
            pages: set.pages,
            attempts: sink.attempts,
            downloaded: sink.downloaded,
            failures: sink.failures,
        })
    }
}

/// Downloads the matching rows of each page while that page is displayed.
struct DownloadSink<'s, V: ArtifactValidator> {
    download_dir: &'s Path,
    pdf_dir: &'s Path,
    document_type: &'s str,
    columns: CatalogColumns,
    waits: &'s WaitSettings,
    retries: &'s RetrySettings,
    validator: &'s V,
    log: &'s mut DownloadLog,
    attempts: usize,
    downloaded: usize,
    failures: usize,
}

impl<D: SessionDriver, V: ArtifactValidator> PageSink<D> for DownloadSink<'_, V> {
    async fn on_page(&mut self, driver: &D, target: &Target, page: usize, rows: &[ResultRow]) {
        let matching: Vec<&ResultRow> = rows
            .iter()
            .filter(|row| row.at(self.columns.document_type).map(str::trim) == Some(self.document_type))
            .collect();
        log::info!(
            "[Page {}] Found {} {} entries.",
            page,
            matching.len(),
            self.document_type
        );

        for row in matching {
            self.attempts += 1;
            match self.download(driver, target, row).await {
                Ok(record) => {
                    self.downloaded += 1;
                    log::info!("Saved {}", record.file_name());
                }
                Err(e) => {
                    self.failures += 1;
                    log::warn!(
                        "Error downloading {} for {}: {}",
                        row.at(self.columns.document_number).unwrap_or_default(),
                        target,
                        e
                    );
                }
            }
        }
    }
}

impl<V: ArtifactValidator> DownloadSink<'_, V> {
    async fn download<D: SessionDriver>(
        &mut self,
        driver: &D,
        target: &Target,
        row: &ResultRow,
    ) -> Result<DownloadRecord> {
        let link = row
            .at(self.columns.link)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ScrapeError::Parse("Row has no document link".to_string()))?;
        let document_number = row.at(self.columns.document_number).unwrap_or_default();
        let date = row.at(self.columns.date).unwrap_or_default();

        log::info!("Downloading document {} for {}", document_number, target);
        let before = files_in(self.download_dir)?;
        click_with_retries(
            driver,
            &Locator::LinkText(link.to_string()),
            &format!("document link: {}", link),
            self.retries,
        )
        .await?;
        let file = wait_for_download(self.download_dir, &before, self.waits).await?;

        if let Err(e) = self.validator.validate(&file) {
            if let Err(remove) = fs::remove_file(&file) {
                log::warn!("Could not remove rejected file {:?}: {}", file, remove);
            }
            return Err(e);
        }

        let record = DownloadRecord::new(target.value(), document_number, date);
        move_file(&file, &self.pdf_dir.join(record.file_name()))?;
        self.log.append(&record)?;
        Ok(record)
    }
}

fn files_in(dir: &Path) -> Result<HashSet<PathBuf>> {
    let mut files = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.insert(path);
        }
    }
    Ok(files)
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PARTIAL_SUFFIXES.contains(&ext))
}

/// Polls `dir` for a finished file that was not there before the click,
/// returning the newest one.
async fn wait_for_download(
    dir: &Path,
    before: &HashSet<PathBuf>,
    waits: &WaitSettings,
) -> Result<PathBuf> {
    let deadline = Instant::now() + waits.download_timeout();
    loop {
        let newest = files_in(dir)?
            .into_iter()
            .filter(|path| !before.contains(path) && !is_partial(path))
            .max_by_key(|path| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH)
            });
        if let Some(file) = newest {
            return Ok(file);
        }
        if Instant::now() >= deadline {
            return Err(ScrapeError::DownloadTimeout {
                dir: dir.to_path_buf(),
                waited: waits.download_timeout(),
            });
        }
        sleep(waits.poll_interval()).await;
    }
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}
