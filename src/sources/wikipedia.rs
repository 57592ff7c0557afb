use crate::error::{Result, SpecsError};
use crate::http_client::HttpFetcher;
use crate::normalize::NameUtils;
use crate::types::{DeviceSource, PartialRecord, SourceKind, SourceOutput};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("valid selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("valid selector"));
static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid citation regex"));
static RELEASE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]+)\s+(\d{1,2}),\s+(\d{4})").expect("valid date regex"));

// Same limits browsers apply to span attributes
const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

/// Release dates from Wikipedia's list of models
pub struct WikipediaSource {
    http: HttpFetcher,
    url: String,
}

impl WikipediaSource {
    pub fn new(http: HttpFetcher, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait::async_trait]
impl DeviceSource for WikipediaSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Wikipedia
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn collect(&self) -> Result<SourceOutput> {
        let html = self.http.get_text(SourceKind::Wikipedia, &self.url, &[]).await?;
        let (records, skipped) = parse_release_table(&html)?;
        info!(
            "Parsed {} release dates from Wikipedia ({} rows skipped)",
            records.len(),
            skipped
        );
        Ok(SourceOutput::new(SourceKind::Wikipedia, records, skipped))
    }
}

#[derive(Debug, Clone)]
struct Cell {
    text: String,
    is_header: bool,
    colspan: usize,
    rowspan: usize,
}

/// Find the first table with a model column and a release date column and
/// read one release date per model.
pub fn parse_release_table(html: &str) -> Result<(Vec<PartialRecord>, usize)> {
    let document = Html::parse_document(html);

    for table in document.select(&TABLE) {
        let grid = expand_grid(read_rows(table));
        let header_rows = grid
            .iter()
            .take_while(|row| !row.is_empty() && row.iter().all(|c| c.is_header))
            .count();
        if header_rows == 0 {
            continue;
        }

        let labels = column_labels(&grid[..header_rows]);
        let Some((model_col, release_col)) = locate_columns(&labels) else {
            continue;
        };

        debug!(
            "Using table with headers {:?} (model column {}, release column {})",
            labels, model_col, release_col
        );

        let mut records = Vec::new();
        let mut skipped = 0;
        for row in &grid[header_rows..] {
            match parse_row(row, model_col, release_col) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        return Ok((records, skipped));
    }

    Err(SpecsError::parse(
        SourceKind::Wikipedia.as_str(),
        "no table with Model and Release date columns",
    ))
}

fn read_rows(table: ElementRef<'_>) -> Vec<Vec<Cell>> {
    table
        .select(&ROW)
        .map(|row| {
            row.select(&CELL)
                .map(|cell| {
                    let span = |attr: &str, max: usize| {
                        cell.value()
                            .attr(attr)
                            .and_then(|v| v.trim().parse::<usize>().ok())
                            .filter(|n| *n > 0)
                            .map_or(1, |n| n.min(max))
                    };
                    Cell {
                        text: clean_cell_text(&cell.text().collect::<String>()),
                        is_header: cell.value().name() == "th",
                        colspan: span("colspan", MAX_COLSPAN),
                        rowspan: span("rowspan", MAX_ROWSPAN),
                    }
                })
                .collect()
        })
        .collect()
}

/// Lay out `rowspan`/`colspan` cells onto a rectangular-ish grid so every
/// row can be indexed by column.
fn expand_grid(rows: Vec<Vec<Cell>>) -> Vec<Vec<Cell>> {
    // Per column: the cell still spanning downwards and how many rows it has left
    let mut pending: Vec<Option<(Cell, usize)>> = Vec::new();
    let mut grid = Vec::with_capacity(rows.len());

    for row in rows {
        let mut out: Vec<Cell> = Vec::new();
        let mut cells = row.into_iter();
        let mut col = 0;

        loop {
            if let Some(Some((cell, remaining))) = pending.get_mut(col) {
                out.push(cell.clone());
                *remaining -= 1;
                if *remaining == 0 {
                    pending[col] = None;
                }
                col += 1;
                continue;
            }

            let Some(cell) = cells.next() else {
                // Trailing columns may still be covered by spans from above
                if pending.iter().skip(col).any(Option::is_some) {
                    out.push(Cell {
                        text: String::new(),
                        is_header: false,
                        colspan: 1,
                        rowspan: 1,
                    });
                    col += 1;
                    continue;
                }
                break;
            };

            for _ in 0..cell.colspan {
                if pending.len() <= col {
                    pending.resize(col + 1, None);
                }
                if cell.rowspan > 1 {
                    pending[col] = Some((cell.clone(), cell.rowspan - 1));
                }
                out.push(cell.clone());
                col += 1;
            }
        }

        grid.push(out);
    }

    grid
}

fn column_labels(header_rows: &[Vec<Cell>]) -> Vec<String> {
    let width = header_rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|col| {
            let mut parts: Vec<&str> = Vec::new();
            for row in header_rows {
                if let Some(cell) = row.get(col) {
                    if parts.last() != Some(&cell.text.as_str()) {
                        parts.push(cell.text.as_str());
                    }
                }
            }
            parts.join(" ")
        })
        .collect()
}

fn locate_columns(labels: &[String]) -> Option<(usize, usize)> {
    let lower: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
    let model = lower.iter().position(|l| l.contains("model"))?;
    let release = lower
        .iter()
        .position(|l| l.contains("release") && l.contains("date"))
        .or_else(|| lower.iter().position(|l| l.contains("release")))?;
    Some((model, release))
}

fn parse_row(row: &[Cell], model_col: usize, release_col: usize) -> Option<PartialRecord> {
    let model = row.get(model_col)?.text.as_str();
    if model.is_empty() {
        return None;
    }
    let date = parse_release_date(&row.get(release_col)?.text)?;
    Some(PartialRecord::new(model, SourceKind::Wikipedia).with_release_date(date))
}

fn clean_cell_text(raw: &str) -> String {
    NameUtils::clean_display_name(&CITATION.replace_all(raw, ""))
}

/// First `Month D, YYYY` date in a cell, e.g. `"September 24, 2021"`.
pub fn parse_release_date(text: &str) -> Option<NaiveDate> {
    let caps = RELEASE_DATE.captures(text)?;
    let candidate = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
    NaiveDate::parse_from_str(&candidate, "%B %d %Y")
        .or_else(|_| NaiveDate::parse_from_str(&candidate, "%b %d %Y"))
        .ok()
}
