//! Scripted in-memory browser used by the orchestration tests.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use url::Url;

use crate::{
    configuration::{CatalogColumns, CatalogSettings, RetrySettings, SiteProfile, WaitSettings},
    domain::{
        locator::{Locator, LocatorTable},
        target::sanitize_file_part,
    },
    error::{Result, ScrapeError},
    services::{
        droid::{ElementState, SelectBy, SelectOption, SessionDriver, SessionFactory},
        interaction::{FormStep, ResultProbe, SearchForm},
        pagination::Paging,
        table_extractor::TableSpec,
    },
};

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub html: String,
    pub elements: HashMap<Locator, ElementState>,
    pub options: HashMap<Locator, Vec<SelectOption>>,
}

impl FakePage {
    pub fn new(html: impl Into<String>) -> Self {
        FakePage {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with(mut self, locator: Locator, text: &str) -> Self {
        self.elements.insert(
            locator,
            ElementState {
                text: text.to_string(),
                enabled: true,
            },
        );
        self
    }

    pub fn with_options(mut self, locator: Locator, options: &[(&str, &str)]) -> Self {
        self.elements.insert(locator.clone(), ElementState::default());
        self.options.insert(
            locator,
            options
                .iter()
                .map(|(value, text)| SelectOption {
                    value: value.to_string(),
                    text: text.to_string(),
                })
                .collect(),
        );
        self
    }
}

/// What the fake site shows: a search form and, per query, its result pages.
#[derive(Clone, Default)]
pub struct FakeSite {
    pub form: FakePage,
    pub submit: Option<Locator>,
    pub next: Option<Locator>,
    pub page_select: Option<Locator>,
    pub results: HashMap<String, Vec<FakePage>>,
    pub downloads: HashMap<String, Vec<u8>>,
    pub broken_page: Option<usize>,
    pub clicked_links: Arc<Mutex<Vec<String>>>,
}

impl FakeSite {
    pub fn new(form: FakePage, submit: Locator) -> Self {
        FakeSite {
            form,
            submit: Some(submit),
            ..Default::default()
        }
    }

    pub fn next_on(mut self, locator: Locator) -> Self {
        self.next = Some(locator);
        self
    }

    pub fn page_select_on(mut self, locator: Locator) -> Self {
        self.page_select = Some(locator);
        self
    }

    pub fn results_for(mut self, query: &str, pages: Vec<FakePage>) -> Self {
        self.results.insert(query.to_string(), pages);
        self
    }

    pub fn download(mut self, link: &str, bytes: &[u8]) -> Self {
        self.downloads.insert(link.to_string(), bytes.to_vec());
        self
    }

    /// Reading the page source fails on this (zero based) result page.
    pub fn break_page(mut self, page: usize) -> Self {
        self.broken_page = Some(page);
        self
    }

    pub fn clicked_links(&self) -> Vec<String> {
        self.clicked_links.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct FakeState {
    query: Option<String>,
    pages: Option<Vec<FakePage>>,
    current: usize,
    source_reads: usize,
}

pub struct FakeDroid {
    site: FakeSite,
    download_dir: Option<PathBuf>,
    state: Mutex<FakeState>,
}

impl FakeDroid {
    pub fn new(site: FakeSite) -> Self {
        FakeDroid {
            site,
            download_dir: None,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn downloading_to(mut self, dir: &Path) -> Self {
        self.download_dir = Some(dir.to_path_buf());
        self
    }

    pub fn source_reads(&self) -> usize {
        self.state.lock().unwrap().source_reads
    }

    fn view(&self, state: &FakeState) -> FakePage {
        let Some(pages) = &state.pages else {
            return self.site.form.clone();
        };
        let mut page = pages.get(state.current).cloned().unwrap_or_default();
        if let Some(next) = &self.site.next {
            if state.current + 1 < pages.len() {
                page = page.with(next.clone(), ">");
            }
        }
        if let Some(select) = &self.site.page_select {
            if pages.len() > 1 {
                let numbers: Vec<String> = (1..=pages.len()).map(|n| n.to_string()).collect();
                let options: Vec<(&str, &str)> =
                    numbers.iter().map(|n| (n.as_str(), n.as_str())).collect();
                page = page.with_options(select.clone(), &options);
            }
        }
        page
    }

    fn require(&self, state: &FakeState, locator: &Locator) -> Result<()> {
        match self.view(state).elements.contains_key(locator) {
            true => Ok(()),
            false => Err(ScrapeError::missing(format!("{:?}", locator))),
        }
    }
}

impl SessionDriver for FakeDroid {
    async fn navigate(&self, _url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pages = None;
        state.current = 0;
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<ElementState> {
        let state = self.state.lock().unwrap();
        self.view(&state)
            .elements
            .get(locator)
            .cloned()
            .ok_or_else(|| ScrapeError::missing(format!("{:?}", locator)))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if self.site.next.as_ref() == Some(locator) {
            self.require(&state, locator)?;
            state.current += 1;
            return Ok(());
        }

        if let Locator::LinkText(text) = locator {
            self.site.clicked_links.lock().unwrap().push(text.clone());
            if let (Some(dir), Some(bytes)) = (&self.download_dir, self.site.downloads.get(text)) {
                std::fs::write(dir.join(format!("{}.pdf", sanitize_file_part(text))), bytes)?;
            }
            return Ok(());
        }

        self.require(&state, locator)?;
        if self.site.submit.as_ref() == Some(locator) {
            let query = state.query.clone().unwrap_or_default();
            state.pages = Some(self.site.results.get(&query).cloned().unwrap_or_default());
            state.current = 0;
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.require(&state, locator)?;
        state.query = Some(text.to_string());
        Ok(())
    }

    async fn select(&self, locator: &Locator, choice: &SelectBy) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.require(&state, locator)?;
        match choice {
            SelectBy::Text(text) => state.query = Some(text.clone()),
            SelectBy::Index(index) if self.site.page_select.as_ref() == Some(locator) => {
                state.current = *index
            }
            _ => {}
        }
        Ok(())
    }

    async fn options(&self, locator: &Locator) -> Result<Vec<SelectOption>> {
        let state = self.state.lock().unwrap();
        self.view(&state)
            .options
            .get(locator)
            .cloned()
            .ok_or_else(|| ScrapeError::missing(format!("{:?}", locator)))
    }

    async fn page_source(&self) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.source_reads += 1;
        if state.pages.is_some() && self.site.broken_page == Some(state.current) {
            return Err(ScrapeError::Io(std::io::Error::other("renderer crashed")));
        }
        Ok(self.view(&state).html)
    }
}

pub struct FakeFactory {
    pub site: FakeSite,
}

impl SessionFactory for FakeFactory {
    type Driver = FakeDroid;

    async fn open(&self, download_dir: &Path) -> Result<FakeDroid> {
        Ok(FakeDroid::new(self.site.clone()).downloading_to(download_dir))
    }

    async fn close(&self, _driver: FakeDroid) {}
}

pub fn fast_waits() -> WaitSettings {
    WaitSettings {
        element_timeout_millis: 30,
        poll_interval_millis: 1,
        settle_millis: 0,
        download_timeout_millis: 50,
    }
}

pub fn quick_retries() -> RetrySettings {
    RetrySettings {
        click: 2,
        click_backoff_millis: 0,
        indeterminate: 0,
    }
}

/// A results page whose table has one `RN Number` column.
pub fn rn_table(values: &[&str]) -> String {
    let rows: String = values
        .iter()
        .map(|v| format!("<tr><td>{}</td></tr>", v))
        .collect();
    format!(
        "<html><body><table><tr><th>RN Number</th></tr>{}</table></body></html>",
        rows
    )
}

/// Bytes of a one page PDF.
pub fn tiny_pdf() -> Vec<u8> {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = vec![];
    doc.save_to(&mut bytes).unwrap();
    bytes
}

pub fn records_site() -> SiteProfile {
    SiteProfile {
        base_url: Url::parse("https://records.example.gov/cs/").unwrap(),
        form: SearchForm {
            path: "search".to_string(),
            steps: vec![
                FormStep::FillTarget {
                    field: "reference".to_string(),
                },
                FormStep::Click {
                    field: "search".to_string(),
                },
            ],
        },
        probe: ResultProbe {
            no_results: Some("empty".to_string()),
            results: Some("results".to_string()),
            ..Default::default()
        },
        table: TableSpec::default(),
        paging: Paging::PageSelect {
            field: "pages".to_string(),
        },
        locators: LocatorTable::default()
            .with("reference", Locator::Id("ref".to_string()))
            .with("search", Locator::Id("go".to_string()))
            .with("empty", Locator::XPath("//span[@id='none']".to_string()))
            .with("results", Locator::Css("table".to_string()))
            .with("pages", Locator::Name("pageSelectList".to_string())),
        max_pages: 20,
    }
}

pub fn catalog_settings(dir: &Path) -> CatalogSettings {
    std::fs::create_dir_all(dir.join("pdfs")).unwrap();
    std::fs::create_dir_all(dir.join("scratch")).unwrap();
    CatalogSettings {
        registry_file: "all_scraped_rns.csv".into(),
        pdf_dir: "pdfs".into(),
        scratch_dir: "scratch".into(),
        download_log: "download_logs.csv".into(),
        download_counts: "download_counts.csv".into(),
        document_type: "MAERT".to_string(),
        redownload_logged: false,
        columns: CatalogColumns {
            link: 0,
            document_number: 1,
            date: 3,
            document_type: 2,
        },
        site: records_site(),
    }
}

/// Rows of (link, document number, type, date).
pub fn documents_page(rows: &[(&str, &str, &str, &str)]) -> FakePage {
    let body: String = rows
        .iter()
        .map(|(link, number, kind, date)| {
            format!(
                "<tr><td><a>{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>",
                link, number, kind, date
            )
        })
        .collect();
    FakePage::new(format!(
        "<table><tr><th>Link</th><th>Number</th><th>Type</th><th>Date</th></tr>{}</table>",
        body
    ))
    .with(Locator::Css("table".to_string()), "")
}

pub fn records_form() -> FakePage {
    FakePage::new("<form/>")
        .with(Locator::Id("ref".to_string()), "")
        .with(Locator::Id("go".to_string()), "Search")
}
