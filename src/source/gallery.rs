//! Selector-driven gallery page source
//!
//! This is the concrete [`PageSource`] for sites that render a paginated
//! browse grid of record cards plus a detail page per record. All the
//! markup knowledge lives in the configured CSS selectors; nothing here is
//! specific to one site.

use crate::config::Config;
use crate::source::traits::PageSource;
use crate::source::SessionSlot;
use crate::storage::Record;
use crate::{ConfigError, ConfigResult, HarvestError, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Pre-parsed selectors for the browse and detail pages
struct Selectors {
    record_container: Selector,
    record_link: Selector,
    record_image: Selector,
    record_title: Selector,
    record_description: Selector,
    record_tag: Selector,
    detail_group: Selector,
    detail_label: Selector,
    detail_value: Selector,
    detail_image: Selector,
    next_page: Selector,
    total_pages: Option<Selector>,
    value_link: Selector,
}

fn parse_selector(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Gallery-site implementation of the page-source contract
pub struct GallerySource {
    base_url: Url,
    browse_path: String,
    detail_path_template: String,
    selectors: Selectors,
}

impl GallerySource {
    /// Builds a source from configuration, parsing every selector up front
    pub fn new(config: &Config) -> ConfigResult<Self> {
        let base_url = Url::parse(&config.source.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

        let s = &config.selectors;
        let selectors = Selectors {
            record_container: parse_selector(&s.record_container)?,
            record_link: parse_selector(&s.record_link)?,
            record_image: parse_selector(&s.record_image)?,
            record_title: parse_selector(&s.record_title)?,
            record_description: parse_selector(&s.record_description)?,
            record_tag: parse_selector(&s.record_tag)?,
            detail_group: parse_selector(&s.detail_group)?,
            detail_label: parse_selector(&s.detail_label)?,
            detail_value: parse_selector(&s.detail_value)?,
            detail_image: parse_selector(&s.detail_image)?,
            next_page: parse_selector(&s.next_page)?,
            total_pages: s.total_pages.as_deref().map(parse_selector).transpose()?,
            value_link: parse_selector("a")?,
        };

        Ok(Self {
            base_url,
            browse_path: config.source.browse_path.clone(),
            detail_path_template: config.source.detail_path_template.clone(),
            selectors,
        })
    }

    /// URL of a given browse page; page 1 is the bare browse path
    fn browse_url(&self, page_number: u32) -> Result<Url> {
        let mut url = self.base_url.join(&self.browse_path)?;
        if page_number > 1 {
            url.query_pairs_mut()
                .append_pair("page", &page_number.to_string());
        }
        Ok(url)
    }

    /// URL of a record's detail page
    fn detail_url(&self, source_id: &str) -> Result<Url> {
        let path = self.detail_path_template.replace("{id}", source_id);
        Ok(self.base_url.join(&path)?)
    }

    fn document_or_err(&self, slot: &SessionSlot) -> Result<String> {
        slot.page
            .document()
            .map(|d| d.to_string())
            .ok_or_else(|| HarvestError::Extraction {
                url: self.base_url.to_string(),
                message: "No document loaded on page handle".to_string(),
            })
    }

    /// Builds a record draft from one browse-grid container
    fn record_from_container(&self, container: ElementRef<'_>) -> Option<Record> {
        // The link href carries the source id as its last path segment
        let href = container
            .select(&self.selectors.record_link)
            .next()
            .and_then(|a| a.value().attr("href"))?;
        let source_id = href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())?
            .to_string();

        let image = container.select(&self.selectors.record_image).next()?;
        let src = image.value().attr("src")?;
        let asset_url = self
            .base_url
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string());

        let mut record = Record::new(source_id);
        record.asset_url = asset_url.clone();
        record.thumbnail_url = asset_url;

        record.title = container
            .select(&self.selectors.record_title)
            .next()
            .map(element_text)
            .or_else(|| image.value().attr("alt").map(|a| a.trim().to_string()))
            .unwrap_or_default();

        record.description = container
            .select(&self.selectors.record_description)
            .next()
            .map(element_text)
            .unwrap_or_default();

        for tag in container.select(&self.selectors.record_tag) {
            record.add_tag(element_text(tag));
        }

        Some(record)
    }

    fn extract_records(&self, html: &str, url: &str) -> Result<Vec<Record>> {
        let document = Html::parse_document(html);

        let containers: Vec<_> = document.select(&self.selectors.record_container).collect();
        let records: Vec<Record> = containers
            .iter()
            .filter_map(|c| self.record_from_container(*c))
            .collect();

        // An empty grid is legitimate; a grid we could not read is not.
        if !containers.is_empty() && records.is_empty() {
            return Err(HarvestError::Extraction {
                url: url.to_string(),
                message: format!(
                    "Found {} record containers but extracted none",
                    containers.len()
                ),
            });
        }

        Ok(records)
    }

    fn extract_details(&self, html: &str) -> HashMap<String, String> {
        let document = Html::parse_document(html);
        let mut details = HashMap::new();

        for group in document.select(&self.selectors.detail_group) {
            let label = match group.select(&self.selectors.detail_label).next() {
                Some(el) => element_text(el).trim_end_matches(':').trim().to_string(),
                None => continue,
            };
            let value_el = match group.select(&self.selectors.detail_value).next() {
                Some(el) => el,
                None => continue,
            };

            // Linked values (directors, tags) are joined; plain values taken
            // as text.
            let links: Vec<String> = value_el
                .select(&self.selectors.value_link)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            let value = if links.is_empty() {
                element_text(value_el)
            } else {
                links.join(", ")
            };

            if !label.is_empty() && !value.is_empty() {
                details.insert(label, value);
            }
        }

        // The detail page's full-size image supersedes the grid thumbnail
        if let Some(img) = document.select(&self.selectors.detail_image).next() {
            if let Some(src) = img.value().attr("src") {
                let resolved = self
                    .base_url
                    .join(src)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| src.to_string());
                details.insert("image".to_string(), resolved);
            }
        }

        details
    }
}

#[async_trait]
impl PageSource for GallerySource {
    async fn navigate_to_page(&self, slot: &mut SessionSlot, page_number: u32) -> Result<bool> {
        let url = self.browse_url(page_number)?;
        slot.goto(url).await?;
        slot.page.set_page_number(page_number);

        let html = self.document_or_err(slot)?;
        let document = Html::parse_document(&html);
        let looks_like_browse = document
            .select(&self.selectors.record_container)
            .next()
            .is_some();
        Ok(looks_like_browse)
    }

    async fn list_records(&self, slot: &mut SessionSlot) -> Result<Vec<Record>> {
        let html = self.document_or_err(slot)?;
        let url = slot
            .page
            .current_url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| self.base_url.to_string());
        self.extract_records(&html, &url)
    }

    async fn enrich_record(
        &self,
        slot: &mut SessionSlot,
        source_id: &str,
    ) -> Result<HashMap<String, String>> {
        let url = self.detail_url(source_id)?;
        let html = slot.session.fetch(&url).await?;
        Ok(self.extract_details(&html))
    }

    fn has_next_page(&self, slot: &SessionSlot) -> Result<bool> {
        let html = slot.page.document().ok_or_else(|| HarvestError::Extraction {
            url: self.base_url.to_string(),
            message: "No document loaded on page handle".to_string(),
        })?;
        let document = Html::parse_document(html);

        if document.select(&self.selectors.next_page).next().is_some() {
            return Ok(true);
        }

        // Fall back to the announced total when the next control is absent
        if let Some(total) = self.total_pages_from(&document) {
            return Ok(slot.page.page_number() < total);
        }

        Ok(false)
    }

    fn total_pages(&self, slot: &SessionSlot) -> Option<u32> {
        let html = slot.page.document()?;
        let document = Html::parse_document(html);
        self.total_pages_from(&document)
    }
}

impl GallerySource {
    fn total_pages_from(&self, document: &Html) -> Option<u32> {
        let selector = self.selectors.total_pages.as_ref()?;
        let text = document.select(selector).next().map(element_text)?;
        last_integer(&text)
    }
}

/// Collapses an element's text nodes into one trimmed string
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// The last integer appearing in a string, e.g. "Page 3 of 52" -> 52
fn last_integer(text: &str) -> Option<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .last()
        .and_then(|s| s.parse().ok())
}
