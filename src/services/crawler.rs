use tokio::time::sleep;

use crate::{
    configuration::{RetrySettings, SiteProfile, WaitSettings},
    domain::{
        result_row::{CrawlStatus, ResultRow, TargetResultSet},
        target::Target,
    },
    error::{CrawlError, Result},
    services::{
        droid::SessionDriver,
        interaction::{probe_results, submit_search, SearchOutcome},
        pagination::{PageSignal, Pager, PaginationController, StopRule},
        table_extractor::{extract, TableSpec},
    },
};

/// Receives every extracted page while it is still displayed in the browser.
#[allow(async_fn_in_trait)]
pub trait PageSink<D: SessionDriver> {
    async fn on_page(&mut self, driver: &D, target: &Target, page: usize, rows: &[ResultRow]);
}

/// Sink for crawls that only need the accumulated rows.
pub struct Discard;

impl<D: SessionDriver> PageSink<D> for Discard {
    async fn on_page(&mut self, _driver: &D, _target: &Target, _page: usize, _rows: &[ResultRow]) {}
}

pub struct Crawler<'a, D: SessionDriver> {
    driver: &'a D,
    site: &'a SiteProfile,
    table: TableSpec,
    waits: &'a WaitSettings,
    retries: &'a RetrySettings,
}

impl<'a, D: SessionDriver> Crawler<'a, D> {
    pub fn new(
        driver: &'a D,
        site: &'a SiteProfile,
        waits: &'a WaitSettings,
        retries: &'a RetrySettings,
    ) -> Self {
        Crawler {
            driver,
            site,
            table: site.table.clone(),
            waits,
            retries,
        }
    }

    /// Raises the table's column floor, for callers that index rows by position.
    pub fn require_columns(mut self, columns: usize) -> Self {
        self.table.min_columns = self.table.min_columns.max(columns);
        self
    }

    pub async fn crawl(&self, target: &Target) -> std::result::Result<TargetResultSet, CrawlError> {
        self.crawl_with(target, &mut Discard).await
    }

    /// Searches for `target` and walks its result pages. Page level failures
    /// end the walk but keep the rows gathered so far; only a failed search is
    /// an error.
    pub async fn crawl_with<S: PageSink<D>>(
        &self,
        target: &Target,
        sink: &mut S,
    ) -> std::result::Result<TargetResultSet, CrawlError> {
        log::info!("Starting crawl for {}", target);

        let outcome = match self.search(target).await {
            Ok(outcome) => outcome,
            Err(source) => {
                return Err(CrawlError {
                    target: target.value().to_string(),
                    source,
                    page_source: self.driver.page_source().await.ok(),
                })
            }
        };

        let rule = match outcome {
            SearchOutcome::NoResults => {
                log::info!("No results for {}", target);
                return Ok(TargetResultSet::empty(target.clone(), CrawlStatus::NoResults));
            }
            SearchOutcome::Indeterminate => {
                log::warn!("Could not tell whether {} has results", target);
                return Ok(TargetResultSet::empty(target.clone(), CrawlStatus::Indeterminate));
            }
            SearchOutcome::SingleRecord(row) => {
                let rows = vec![row];
                sink.on_page(self.driver, target, 1, &rows).await;
                return Ok(TargetResultSet {
                    target: target.clone(),
                    rows,
                    declared_total: Some(1),
                    pages: 1,
                    status: CrawlStatus::Complete,
                });
            }
            SearchOutcome::Declared(total) => {
                log::info!("{} records found for {}", total, target);
                StopRule::KnownTotal(total)
            }
            SearchOutcome::Listed => StopRule::NextLink,
        };

        let controller = PaginationController::new(rule, self.site.max_pages);
        let mut result = TargetResultSet {
            target: target.clone(),
            rows: vec![],
            declared_total: match rule {
                StopRule::KnownTotal(total) => Some(total),
                StopRule::NextLink => None,
            },
            pages: 0,
            status: CrawlStatus::Complete,
        };

        if controller.should_start() == PageSignal::Stop {
            result.status = CrawlStatus::NoResults;
            return Ok(result);
        }

        let mut pager = Pager::new(&self.site.paging, &self.site.locators);
        loop {
            let page = result.pages + 1;
            let rows = match self.extract_page().await {
                Ok(rows) => rows,
                Err(e) => {
                    log::warn!("[{}] Page {} extraction failed: {}", target, page, e);
                    result.status = CrawlStatus::Partial(e.to_string());
                    break;
                }
            };

            result.pages = page;
            log::info!(
                "[{}] Page {}: {} rows ({} so far)",
                target,
                page,
                rows.len(),
                result.count() + rows.len()
            );
            sink.on_page(self.driver, target, page, &rows).await;
            result.rows.extend(rows);

            let next = pager.probe(self.driver).await;
            if controller.after_page(result.pages, result.count(), next) == PageSignal::Stop {
                break;
            }

            if let Err(e) = pager.advance(self.driver, self.retries).await {
                log::warn!("[{}] Could not move past page {}: {}", target, page, e);
                result.status = CrawlStatus::Partial(e.to_string());
                break;
            }
            sleep(self.waits.settle()).await;
        }

        if let Some(total) = result.declared_total {
            if result.count() != total {
                log::warn!(
                    "[{}] Site declared {} records but {} were collected",
                    target,
                    total,
                    result.count()
                );
            }
        }

        Ok(result)
    }

    async fn search(&self, target: &Target) -> Result<SearchOutcome> {
        let url = self.site.form_url()?;
        submit_search(
            self.driver,
            url.as_str(),
            &self.site.form,
            &self.site.locators,
            target,
            self.waits,
            self.retries,
        )
        .await?;
        probe_results(self.driver, &self.site.probe, &self.site.locators, self.waits).await
    }

    async fn extract_page(&self) -> Result<Vec<ResultRow>> {
        let page = self.driver.page_source().await?;
        extract(&page, &self.table)
    }
}
