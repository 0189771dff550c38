use std::collections::HashMap;

use serde::Deserialize;
use thirtyfour::By;

use crate::error::{Result, ScrapeError};

/// How a page element is looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Id(String),
    Name(String),
    #[serde(rename = "xpath")]
    XPath(String),
    Css(String),
    LinkText(String),
}

impl Locator {
    pub fn to_by(&self) -> By {
        match self {
            Locator::Id(v) => By::Id(v.as_str()),
            Locator::Name(v) => By::Name(v.as_str()),
            Locator::XPath(v) => By::XPath(v.as_str()),
            Locator::Css(v) => By::Css(v.as_str()),
            Locator::LinkText(v) => By::LinkText(v.as_str()),
        }
    }
}

/// Logical field names ("search_button", "county_select", ...) mapped to the
/// locator used on a particular site. Crawl and download logic only ever
/// refer to fields, so they can run against any site or a fake driver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct LocatorTable(HashMap<String, Locator>);

impl LocatorTable {
    pub fn get(&self, field: &str) -> Result<&Locator> {
        self.0.get(field).ok_or_else(|| ScrapeError::missing(field))
    }

    pub fn with(mut self, field: &str, locator: Locator) -> Self {
        self.0.insert(field.to_string(), locator);
        self
    }
}

impl FromIterator<(String, Locator)> for LocatorTable {
    fn from_iter<T: IntoIterator<Item = (String, Locator)>>(iter: T) -> Self {
        LocatorTable(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{Locator, LocatorTable};
    use crate::error::ScrapeError;

    #[test]
    fn unknown_field_is_locator_not_found() {
        let table = LocatorTable::default().with("next", Locator::LinkText(">".to_string()));

        assert_eq!(
            table.get("next").unwrap(),
            &Locator::LinkText(">".to_string())
        );
        assert!(matches!(
            table.get("search_button"),
            Err(ScrapeError::LocatorNotFound { field }) if field == "search_button"
        ));
    }

    #[test]
    fn locator_deserializes_from_tagged_map() {
        let locator: Locator =
            serde_json::from_str(r#"{ "by": "xpath", "value": "//select[@name='x']" }"#).unwrap();

        assert_eq!(locator, Locator::XPath("//select[@name='x']".to_string()));
    }
}
