use std::path::Path;

use serde_json::json;
use thirtyfour::{
    components::SelectElement, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver,
    WebElement,
};

use crate::{
    configuration::WebDriverSettings,
    domain::locator::Locator,
    error::{Result, ScrapeError},
};

/// Snapshot of a located element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementState {
    pub text: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectBy {
    Value(String),
    Text(String),
    Index(usize),
}

/// The browser operations the crawl and download logic relies on.
#[allow(async_fn_in_trait)]
pub trait SessionDriver {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn find(&self, locator: &Locator) -> Result<ElementState>;
    async fn click(&self, locator: &Locator) -> Result<()>;
    /// Clears the element and types `text` into it.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<()>;
    async fn select(&self, locator: &Locator, choice: &SelectBy) -> Result<()>;
    async fn options(&self, locator: &Locator) -> Result<Vec<SelectOption>>;
    async fn page_source(&self) -> Result<String>;
}

/// Opens one browser session per download directory.
#[allow(async_fn_in_trait)]
pub trait SessionFactory {
    type Driver: SessionDriver;

    async fn open(&self, download_dir: &Path) -> Result<Self::Driver>;
    async fn close(&self, driver: Self::Driver);
}

pub struct Droid {
    pub driver: WebDriver,
}

impl Droid {
    pub async fn new(settings: &WebDriverSettings, download_dir: Option<&Path>) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.set_headless()?;
        }
        caps.set_no_sandbox()?;
        caps.set_disable_dev_shm_usage()?;
        caps.add_arg("--window-size=1920,1080")?;

        if let Some(dir) = download_dir {
            caps.add_experimental_option(
                "prefs",
                json!({
                    "download.default_directory": dir.to_string_lossy(),
                    "download.prompt_for_download": false,
                    "plugins.always_open_pdf_externally": true,
                }),
            )?;
        }

        let driver = WebDriver::new(settings.server_url.as_str(), caps).await?;
        if !settings.headless {
            driver.maximize_window().await?;
        }

        Ok(Droid { driver })
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await?;
        Ok(())
    }

    async fn locate(&self, locator: &Locator) -> Result<WebElement> {
        self.driver
            .find(locator.to_by())
            .await
            .map_err(|_| ScrapeError::missing(format!("{:?}", locator)))
    }
}

impl SessionDriver for Droid {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<ElementState> {
        let element = self.locate(locator).await?;
        Ok(ElementState {
            text: element.text().await?,
            enabled: element.is_enabled().await?,
        })
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.locate(locator).await?.click().await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.locate(locator).await?;
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn select(&self, locator: &Locator, choice: &SelectBy) -> Result<()> {
        let element = self.locate(locator).await?;
        let select = SelectElement::new(&element).await?;
        match choice {
            SelectBy::Value(value) => select.select_by_value(value).await?,
            SelectBy::Text(text) => select.select_by_visible_text(text).await?,
            SelectBy::Index(index) => select.select_by_index(*index as u32).await?,
        }
        Ok(())
    }

    async fn options(&self, locator: &Locator) -> Result<Vec<SelectOption>> {
        let element = self.locate(locator).await?;
        let select = SelectElement::new(&element).await?;

        let mut options = vec![];
        for option in select.options().await? {
            options.push(SelectOption {
                value: option.attr("value").await?.unwrap_or_default(),
                text: option.text().await?.trim().to_string(),
            });
        }
        Ok(options)
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.driver.source().await?)
    }
}

pub struct DroidFactory {
    settings: WebDriverSettings,
}

impl DroidFactory {
    pub fn new(settings: WebDriverSettings) -> Self {
        DroidFactory { settings }
    }
}

impl SessionFactory for DroidFactory {
    type Driver = Droid;

    async fn open(&self, download_dir: &Path) -> Result<Droid> {
        Droid::new(&self.settings, Some(download_dir)).await
    }

    async fn close(&self, driver: Droid) {
        if let Err(e) = driver.quit().await {
            log::warn!("Failed to close browser session: {}", e);
        }
    }
}
