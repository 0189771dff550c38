use serde::Deserialize;
use tokio::time::{sleep, Instant};

use crate::{
    configuration::{RetrySettings, WaitSettings},
    domain::{
        locator::{Locator, LocatorTable},
        result_row::ResultRow,
        target::Target,
    },
    error::{Result, ScrapeError},
    services::{
        droid::{ElementState, SelectBy, SessionDriver},
        table_extractor::{extract_detail, DetailView},
    },
};

/// A search page and the steps that fill it in for one target.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchForm {
    pub path: String,
    pub steps: Vec<FormStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FormStep {
    SelectValue { field: String, value: String },
    /// Select the option whose visible text is the target value.
    SelectTarget { field: String },
    FillTarget { field: String },
    Click { field: String },
}

/// Elements that tell the outcome of a submitted search apart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultProbe {
    pub no_results: Option<String>,
    pub no_results_text: Option<String>,
    pub record_count: Option<String>,
    pub results: Option<String>,
    pub detail_view: Option<DetailView>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NoResults,
    Declared(usize),
    /// A results table with no declared total.
    Listed,
    SingleRecord(ResultRow),
    Indeterminate,
}

/// Polls until `locator` is present or the element timeout runs out.
pub async fn wait_for<D: SessionDriver>(
    driver: &D,
    locator: &Locator,
    waits: &WaitSettings,
) -> Option<ElementState> {
    let deadline = Instant::now() + waits.element_timeout();
    loop {
        if let Ok(element) = driver.find(locator).await {
            return Some(element);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(waits.poll_interval()).await;
    }
}

pub async fn click_with_retries<D: SessionDriver>(
    driver: &D,
    locator: &Locator,
    description: &str,
    retries: &RetrySettings,
) -> Result<()> {
    let attempts = retries.click.max(1);
    for attempt in 1..=attempts {
        match driver.click(locator).await {
            Ok(()) => {
                log::debug!("Clicked: {}", description);
                return Ok(());
            }
            Err(e) => {
                log::warn!(
                    "Attempt {} failed to click [{}]: {}",
                    attempt,
                    description,
                    e
                );
                if attempt < attempts {
                    sleep(retries.click_backoff()).await;
                }
            }
        }
    }

    log::error!(
        "Failed to click element after {} attempts: [{}]",
        attempts,
        description
    );
    Err(ScrapeError::ExhaustedRetries {
        action: format!("click {}", description),
        attempts,
    })
}

/// Opens the search page and runs every form step. Any missing control
/// fails the whole search.
pub async fn submit_search<D: SessionDriver>(
    driver: &D,
    url: &str,
    form: &SearchForm,
    locators: &LocatorTable,
    target: &Target,
    waits: &WaitSettings,
    retries: &RetrySettings,
) -> Result<()> {
    driver.navigate(url).await?;

    for step in &form.steps {
        let field = match step {
            FormStep::SelectValue { field, .. }
            | FormStep::SelectTarget { field }
            | FormStep::FillTarget { field }
            | FormStep::Click { field } => field,
        };
        let locator = locators.get(field)?;
        if wait_for(driver, locator, waits).await.is_none() {
            return Err(ScrapeError::missing(field.as_str()));
        }

        match step {
            FormStep::SelectValue { value, .. } => {
                driver
                    .select(locator, &SelectBy::Value(value.clone()))
                    .await?
            }
            FormStep::SelectTarget { .. } => {
                driver
                    .select(locator, &SelectBy::Text(target.value().to_string()))
                    .await?
            }
            FormStep::FillTarget { .. } => driver.fill(locator, target.value()).await?,
            FormStep::Click { field } => {
                click_with_retries(driver, locator, field, retries).await?
            }
        }
    }

    Ok(())
}

/// Waits for the submitted search to settle into one of its outcomes.
pub async fn probe_results<D: SessionDriver>(
    driver: &D,
    probe: &ResultProbe,
    locators: &LocatorTable,
    waits: &WaitSettings,
) -> Result<SearchOutcome> {
    let no_results = probe.no_results.as_deref().map(|f| locators.get(f)).transpose()?;
    let record_count = probe.record_count.as_deref().map(|f| locators.get(f)).transpose()?;
    let results = probe.results.as_deref().map(|f| locators.get(f)).transpose()?;

    let deadline = Instant::now() + waits.element_timeout();
    loop {
        if let Some(locator) = no_results {
            if let Ok(element) = driver.find(locator).await {
                let confirmed = probe
                    .no_results_text
                    .as_deref()
                    .map_or(true, |text| element.text.contains(text));
                if confirmed {
                    return Ok(SearchOutcome::NoResults);
                }
            }
        }

        if let Some(locator) = record_count {
            if let Ok(element) = driver.find(locator).await {
                return Ok(match parse_record_count(&element.text) {
                    Some(total) => SearchOutcome::Declared(total),
                    None => {
                        log::warn!("No numeric record count found in line: '{}'", element.text);
                        SearchOutcome::NoResults
                    }
                });
            }
        }

        if let Some(locator) = results {
            if driver.find(locator).await.is_ok() {
                return Ok(SearchOutcome::Listed);
            }
        }

        if Instant::now() >= deadline {
            break;
        }
        sleep(waits.poll_interval()).await;
    }

    if let Some(view) = &probe.detail_view {
        let page = driver.page_source().await?;
        if let Some(row) = extract_detail(&page, view)? {
            log::info!("Only one result, parsed single record view");
            return Ok(SearchOutcome::SingleRecord(row));
        }
    }

    log::warn!("Timeout while waiting for results or empty message");
    Ok(SearchOutcome::Indeterminate)
}

/// First all-digit token, thousands separators ignored: "1,204 records found" -> 1204.
pub fn parse_record_count(line: &str) -> Option<usize> {
    line.split_whitespace()
        .map(|token| token.replace(',', ""))
        .find(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        .and_then(|token| token.parse().ok())
}
