use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::data_models::{RenderedPage, ResultEntry};
use crate::error::{ExtractionError, SchemaError};

/// Selector triple as written in configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SchemaSpec {
    pub container: String,
    pub title: String,
    pub link: String,
}

impl SchemaSpec {
    pub fn new(container: &str, title: &str, link: &str) -> SchemaSpec {
        SchemaSpec {
            container: container.to_string(),
            title: title.to_string(),
            link: link.to_string(),
        }
    }

    /// Google's organic result card layout.
    pub fn google() -> SchemaSpec {
        SchemaSpec::new(".tF2Cxc", ".DKV0Md", ".yuRUbf a")
    }
}

/// A schema whose selectors have been parsed.
#[derive(Debug, Clone)]
pub struct ExtractionSchema {
    container: Selector,
    title: Selector,
    link: Selector,
}

impl ExtractionSchema {
    pub fn compile(spec: &SchemaSpec) -> Result<ExtractionSchema, SchemaError> {
        Ok(ExtractionSchema {
            container: parse_selector("container", &spec.container)?,
            title: parse_selector("title", &spec.title)?,
            link: parse_selector("link", &spec.link)?,
        })
    }

    /// Compiles every spec, refusing an empty list.
    pub fn compile_all(specs: &[SchemaSpec]) -> Result<Vec<ExtractionSchema>, SchemaError> {
        if specs.is_empty() {
            return Err(SchemaError::Empty);
        }
        specs.iter().map(ExtractionSchema::compile).collect()
    }

    fn extract(&self, document: &Html, page: &RenderedPage) -> Option<Vec<ResultEntry>> {
        let mut cards = document.select(&self.container).peekable();
        cards.peek()?;

        Some(
            cards
                .map(|card| ResultEntry::new(self.title_of(card), self.link_of(card, page)))
                .collect(),
        )
    }

    fn title_of(&self, card: ElementRef<'_>) -> Option<String> {
        let node = card.select(&self.title).next()?;
        let text = node.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!text.is_empty()).then_some(text)
    }

    // Resolved the way a browser resolves `anchor.href`.
    fn link_of(&self, card: ElementRef<'_>, page: &RenderedPage) -> Option<String> {
        let href = card.select(&self.link).next()?.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        let resolved = page.url.join(href).ok()?;
        match resolved.scheme() {
            "http" | "https" => Some(resolved.to_string()),
            _ => None,
        }
    }
}

fn parse_selector(field: &'static str, raw: &str) -> Result<Selector, SchemaError> {
    if raw.trim().is_empty() {
        return Err(SchemaError::Blank { field });
    }
    Selector::parse(raw).map_err(|e| SchemaError::Invalid {
        field,
        selector: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Pulls result entries out of a rendered page.
///
/// Schemas are tried in order and the first one whose container selector matches
/// anything wins. Entries come back in document order. A page where no schema
/// matches yields an empty list; a page with nothing in its body is an error.
pub fn extract_entries(
    schemas: &[ExtractionSchema],
    page: &RenderedPage,
) -> Result<Vec<ResultEntry>, ExtractionError> {
    let document = Html::parse_document(&page.html);

    if is_blank(&document) {
        return Err(ExtractionError::EmptyPage(page.url.to_string()));
    }

    Ok(schemas
        .iter()
        .find_map(|schema| schema.extract(&document, page))
        .unwrap_or_default())
}

fn is_blank(document: &Html) -> bool {
    let Ok(body_selector) = Selector::parse("body") else {
        return false;
    };
    match document.select(&body_selector).next() {
        Some(body) => {
            !body.children().any(|child| child.value().is_element())
                && body.text().all(|t| t.trim().is_empty())
        }
        None => true,
    }
}
