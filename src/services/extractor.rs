// src/services/extractor.rs

//! Results table extraction.
//!
//! Turns the module results page into ordered [`Record`]s. Columns are read
//! positionally as `id, name, grade, credits`; missing trailing cells read as
//! empty strings.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::logging::LogContext;
use crate::models::{Page, Record};
use crate::utils::normalize_whitespace;

/// Parses results pages into records.
pub struct RecordExtractor {
    table_selector: String,
    table_sel: Selector,
    row_sel: Selector,
}

impl RecordExtractor {
    /// Create an extractor for the table matched by `table_selector`.
    pub fn new(table_selector: &str) -> Result<Self> {
        Ok(Self {
            table_selector: table_selector.to_string(),
            table_sel: parse_selector(table_selector)?,
            row_sel: parse_selector("tr")?,
        })
    }

    /// Extract all data rows of the results table in document order.
    pub fn extract(&self, ctx: &LogContext, page: &Page) -> Result<Vec<Record>> {
        let document = page.document();
        let records = self.extract_document(ctx, &document)?;
        ctx.info(&format!(
            "Extracted {} record(s) from {}",
            records.len(),
            page.url
        ));
        Ok(records)
    }

    fn extract_document(&self, ctx: &LogContext, document: &Html) -> Result<Vec<Record>> {
        let mut tables = document.select(&self.table_sel);
        let table = tables.next().ok_or_else(|| {
            AppError::parse(format!(
                "results table '{}' not found on page",
                self.table_selector
            ))
        })?;
        if tables.next().is_some() {
            ctx.warn(&format!(
                "More than one table matches '{}'; using the first",
                self.table_selector
            ));
        }

        // Rows of tables nested inside the results table are not records.
        let rows = table
            .select(&self.row_sel)
            .filter(|row| owning_table(*row).is_some_and(|t| t.id() == table.id()))
            .map(read_cells)
            .filter(|cells| cells.iter().any(|c| !c.is_empty()));

        let mut records = Vec::new();
        for (index, cells) in rows.enumerate() {
            if index == 0 {
                ctx.debug(&format!("Header row: {}", cells.join(" | ")));
                continue;
            }
            records.push(Self::to_record(cells));
        }
        Ok(records)
    }

    fn to_record(cells: Vec<String>) -> Record {
        let mut cells = cells.into_iter();
        let mut next = || cells.next().unwrap_or_default();
        let id = next();
        let name = next();
        let grade = next();
        let credits = next();
        Record::new(id, name, grade, credits)
    }
}

/// Nearest enclosing `<table>` of an element.
fn owning_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

/// Direct `td`/`th` children of a row, whitespace-normalised.
fn read_cells(row: ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
        .collect()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
