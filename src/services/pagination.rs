use serde::Deserialize;

use crate::{
    configuration::RetrySettings,
    domain::locator::LocatorTable,
    error::Result,
    services::{
        droid::{SelectBy, SessionDriver},
        interaction::click_with_retries,
    },
};

/// When to stop asking for more pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRule {
    /// The site declared how many records exist.
    KnownTotal(usize),
    /// Keep going while a "next" control is offered.
    NextLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    Enabled,
    Disabled,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    Continue,
    Stop,
}

pub struct PaginationController {
    rule: StopRule,
    max_pages: usize,
}

impl PaginationController {
    pub fn new(rule: StopRule, max_pages: usize) -> Self {
        PaginationController { rule, max_pages }
    }

    /// A declared total of zero means there is nothing to extract at all.
    pub fn should_start(&self) -> PageSignal {
        match self.rule {
            StopRule::KnownTotal(0) => PageSignal::Stop,
            _ if self.max_pages == 0 => PageSignal::Stop,
            _ => PageSignal::Continue,
        }
    }

    pub fn after_page(&self, pages_fetched: usize, rows_so_far: usize, next: NextControl) -> PageSignal {
        if pages_fetched >= self.max_pages {
            return PageSignal::Stop;
        }
        if let StopRule::KnownTotal(total) = self.rule {
            if rows_so_far >= total {
                return PageSignal::Stop;
            }
        }
        match next {
            NextControl::Enabled => PageSignal::Continue,
            NextControl::Disabled | NextControl::Absent => PageSignal::Stop,
        }
    }
}

/// The control a site uses to move between result pages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Paging {
    /// A "next" link or button.
    NextLink { field: String },
    /// A page-number dropdown; a missing dropdown means a single page.
    PageSelect { field: String },
}

/// Reads and drives the paging control of the page currently displayed.
pub struct Pager<'a> {
    paging: &'a Paging,
    locators: &'a LocatorTable,
    current: usize,
}

impl<'a> Pager<'a> {
    pub fn new(paging: &'a Paging, locators: &'a LocatorTable) -> Self {
        Pager {
            paging,
            locators,
            current: 0,
        }
    }

    pub async fn probe<D: SessionDriver>(&self, driver: &D) -> NextControl {
        match self.paging {
            Paging::NextLink { field } => {
                let Ok(locator) = self.locators.get(field) else {
                    return NextControl::Absent;
                };
                match driver.find(locator).await {
                    Ok(element) if element.enabled => NextControl::Enabled,
                    Ok(_) => NextControl::Disabled,
                    Err(_) => NextControl::Absent,
                }
            }
            Paging::PageSelect { field } => {
                let Ok(locator) = self.locators.get(field) else {
                    return NextControl::Absent;
                };
                match driver.options(locator).await {
                    Ok(options) if self.current + 1 < options.len() => NextControl::Enabled,
                    _ => NextControl::Absent,
                }
            }
        }
    }

    pub async fn advance<D: SessionDriver>(&mut self, driver: &D, retries: &RetrySettings) -> Result<()> {
        match self.paging {
            Paging::NextLink { field } => {
                let locator = self.locators.get(field)?;
                click_with_retries(driver, locator, "next page", retries).await?;
            }
            Paging::PageSelect { field } => {
                let locator = self.locators.get(field)?;
                driver
                    .select(locator, &SelectBy::Index(self.current + 1))
                    .await?;
            }
        }
        self.current += 1;
        Ok(())
    }
}
