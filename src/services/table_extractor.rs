use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::{
    domain::result_row::ResultRow,
    error::{Result, ScrapeError},
};

/// Which table on the page holds the results.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum TableSelection {
    /// N-th `<table>` in document order, nested tables included.
    Index(usize),
    Css(String),
}

impl Default for TableSelection {
    fn default() -> Self {
        TableSelection::Index(0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSpec {
    #[serde(default)]
    pub selection: TableSelection,
    /// Fewer columns than this is a parse error, not an empty page.
    #[serde(default)]
    pub min_columns: usize,
}

/// Label/value layout used when a search jumps straight to a single record.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailView {
    pub sections: Vec<String>,
    pub label: String,
}

pub fn extract(page_source: &str, spec: &TableSpec) -> Result<Vec<ResultRow>> {
    let doc = Html::parse_document(page_source);
    let table_selector = create_selector("table")?;

    let table = match &spec.selection {
        TableSelection::Index(n) => doc.select(&table_selector).nth(*n),
        TableSelection::Css(css) => doc.select(&create_selector(css)?).next(),
    }
    .ok_or_else(|| ScrapeError::Parse(format!("No table matching {:?}", spec.selection)))?;

    let mut headers: Vec<String> = vec![];
    let mut body: Vec<Vec<String>> = vec![];

    for row in own_rows(table)? {
        let cells: Vec<ElementRef> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .collect();
        if cells.is_empty() {
            continue;
        }

        let all_th = cells.iter().all(|c| c.value().name() == "th");
        if all_th && headers.is_empty() && body.is_empty() {
            headers = dedup_headers(cells.iter().map(|c| cell_text(*c)).collect());
        } else {
            body.push(cells.iter().map(|c| cell_text(*c)).collect());
        }
    }

    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or_default();
    if width < spec.min_columns {
        return Err(ScrapeError::Parse(format!(
            "Table has {} columns, expected at least {}",
            width, spec.min_columns
        )));
    }

    Ok(body
        .into_iter()
        .map(|cells| {
            cells
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    let column = headers.get(i).cloned().unwrap_or_else(|| i.to_string());
                    (column, value)
                })
                .collect()
        })
        .collect())
}

/// Parses a single-record detail page into one row, `None` when no labels are found.
pub fn extract_detail(page_source: &str, view: &DetailView) -> Result<Option<ResultRow>> {
    let doc = Html::parse_document(page_source);
    let label_selector = create_selector(&view.label)?;

    let mut row = ResultRow::default();
    for section in &view.sections {
        let section_selector = create_selector(section)?;
        let Some(section) = doc.select(&section_selector).next() else {
            continue;
        };

        for label in section.select(&label_selector) {
            let label_text = cell_text(label);
            let column = label_text.trim_end_matches(':').trim();
            if column.is_empty() {
                continue;
            }

            let value = label
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| cell_text(parent).replacen(&label_text, "", 1))
                .unwrap_or_default();
            row.push(column, value.trim());
        }
    }

    Ok((!row.is_empty()).then_some(row))
}

/// Rows that belong to `table` itself, skipping rows of nested tables.
fn own_rows(table: ElementRef) -> Result<Vec<ElementRef>> {
    let row_selector = create_selector("tr")?;
    Ok(table
        .select(&row_selector)
        .filter(|row| {
            row.ancestors()
                .find(|n| n.value().as_element().map_or(false, |e| e.name() == "table"))
                .map(|n| n.id())
                == Some(table.id())
        })
        .collect())
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Repeated header names get a `.1`, `.2`, ... suffix so lookups stay unambiguous.
fn dedup_headers(raw: Vec<String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());
    for header in raw {
        let mut candidate = header.clone();
        let mut n = 1;
        while headers.contains(&candidate) {
            candidate = format!("{}.{}", header, n);
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| ScrapeError::Parse(format!("Bad selector: {}", sel_str)))
}

#[cfg(test)]
mod tests {
    use super::{extract, extract_detail, DetailView, TableSelection, TableSpec};
    use crate::error::ScrapeError;

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <table id="layout"><tr><td>Header junk</td></tr></table>
          <table class="results">
            <thead><tr><th>RN Number</th><th>Name</th><th>Name</th></tr></thead>
            <tbody>
              <tr><td> RN100 </td><td>Acme
                  Plant</td><td>x</td></tr>
              <tr><td>RN200</td><td>
                <table><tr><td>nested</td></tr></table>
              </td><td>y</td></tr>
            </tbody>
          </table>
        </body></html>
    "#;

    #[test]
    fn extract_by_css_skips_nested_rows() {
        let spec = TableSpec {
            selection: TableSelection::Css("table.results".to_string()),
            min_columns: 2,
        };
        let rows = extract(RESULTS_PAGE, &spec).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("RN Number"), Some("RN100"));
        assert_eq!(rows[0].get("Name"), Some("Acme Plant"));
        assert_eq!(rows[0].get("Name.1"), Some("x"));
        assert_eq!(rows[1].get("RN Number"), Some("RN200"));
    }

    #[test]
    fn extract_by_index_counts_every_table() {
        let spec = TableSpec {
            selection: TableSelection::Index(0),
            min_columns: 0,
        };
        let rows = extract(RESULTS_PAGE, &spec).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("0"), Some("Header junk"));
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let spec = TableSpec {
            selection: TableSelection::Index(7),
            min_columns: 0,
        };

        assert!(matches!(
            extract(RESULTS_PAGE, &spec),
            Err(ScrapeError::Parse(_))
        ));
    }

    #[test]
    fn narrow_table_is_a_parse_error() {
        let spec = TableSpec {
            selection: TableSelection::Css("table.results".to_string()),
            min_columns: 13,
        };

        assert!(matches!(
            extract(RESULTS_PAGE, &spec),
            Err(ScrapeError::Parse(_))
        ));
    }

    #[test]
    fn detail_view_reads_label_value_pairs() {
        let page = r#"
            <div id="reinfo">
              <p><span class="lbl">RN:</span> RN104321</p>
              <p><span class="lbl">Name:</span> Big Refinery</p>
            </div>
            <div id="geo_loc"><p><label>County:</label> Harris</p></div>
        "#;
        let view = DetailView {
            sections: vec!["div#reinfo".to_string(), "div#geo_loc".to_string()],
            label: ".lbl, label".to_string(),
        };
        let row = extract_detail(page, &view).unwrap().unwrap();

        assert_eq!(row.get("RN"), Some("RN104321"));
        assert_eq!(row.get("Name"), Some("Big Refinery"));
        assert_eq!(row.get("County"), Some("Harris"));
    }

    #[test]
    fn detail_view_without_labels_is_none() {
        let view = DetailView {
            sections: vec!["div#reinfo".to_string()],
            label: ".lbl".to_string(),
        };

        assert!(extract_detail("<p>nothing</p>", &view).unwrap().is_none());
    }
}
