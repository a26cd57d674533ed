// 🏷️ Heuristic Row Classifier - census exports → RegionRecords
// Pure functions from a tokenized row to tagged cells; the CSV driver
// (parse_census_text) wires normalizer → header skip → classify → resolve → dedup.

use crate::area;
use crate::deduplication::dedup_regions;
use crate::encoding::{EncodingConfidence, LineNormalizer};
use crate::records::RegionRecord;
use csv::{ReaderBuilder, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Smallest integer accepted as a metric value; smaller numbers are row
/// numbers, footnote markers, percentages...
pub const MIN_VALUE: i64 = 100;

/// How many leading lines are searched for the first data row
pub const HEADER_SCAN_LINES: usize = 20;

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{5,6}$").unwrap());

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{Han}\p{Hiragana}\p{Katakana}々ー]+[都道府県市区町村郡]").unwrap()
});

static DATA_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{5}").unwrap());

// ============================================================================
// CELL TAGS
// ============================================================================

/// CellTag - what a single cell looks like on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellTag {
    /// Region code, already truncated to 5 digits
    Code(String),
    Name(String),
    Value(i64),
    Unknown,
}

/// ClassifiedRow - a row that carried both a code and a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub code: String,
    /// Empty when no name-like cell was present
    pub name: String,
    pub value: i64,
}

/// Classify one cell independently of its neighbours
///
/// Priority: Code > Name > Value > Unknown. A 5/6-digit cell is only a code when
/// its first two digits name a real prefecture, which is what separates
/// "13101" from a 5-digit population such as "66680".
pub fn classify_cell(cell: &str) -> CellTag {
    let cell = clean_cell(cell);

    if let Some(code) = parse_code(cell) {
        return CellTag::Code(code);
    }

    if is_name(cell) {
        return CellTag::Name(cell.to_string());
    }

    match parse_value(cell) {
        Some(value) if value >= MIN_VALUE => CellTag::Value(value),
        _ => CellTag::Unknown,
    }
}

/// Combine per-cell tags into a row
///
/// code = first Code cell; name = first Name cell; value = first *other*
/// cell that parses as an integer ≥ MIN_VALUE (a second code-shaped cell is
/// still eligible as the value). None when code or value is missing.
pub fn classify_row<S: AsRef<str>>(cells: &[S]) -> Option<ClassifiedRow> {
    let tags: Vec<CellTag> = cells.iter().map(|c| classify_cell(c.as_ref())).collect();

    let (code_idx, code) = tags.iter().enumerate().find_map(|(idx, tag)| match tag {
        CellTag::Code(code) => Some((idx, code.clone())),
        _ => None,
    })?;

    let name = tags
        .iter()
        .find_map(|tag| match tag {
            CellTag::Name(name) => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let value = cells
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != code_idx)
        .find_map(|(_, cell)| parse_value(clean_cell(cell.as_ref())).filter(|v| *v >= MIN_VALUE))?;

    Some(ClassifiedRow { code, name, value })
}

/// Index of the first line (within the scan window) that contains a 5-digit run
///
/// Everything above it is header noise. Falls back to 0.
pub fn find_data_start<S: AsRef<str>>(lines: &[S]) -> usize {
    lines
        .iter()
        .take(HEADER_SCAN_LINES)
        .position(|line| DATA_ROW_RE.is_match(line.as_ref()))
        .unwrap_or(0)
}

/// Strip thousands separators and whitespace, then parse a non-negative integer
pub fn parse_value(cell: &str) -> Option<i64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != ',' && *c != '，' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    cleaned.parse::<i64>().ok()
}

fn parse_code(cell: &str) -> Option<String> {
    if !CODE_RE.is_match(cell) {
        return None;
    }
    if !area::is_known_prefecture(&cell[..2]) {
        return None;
    }
    Some(cell[..5].to_string())
}

fn is_name(cell: &str) -> bool {
    cell.chars().count() >= 2 && NAME_RE.is_match(cell)
}

fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches('"').trim()
}

// ============================================================================
// CENSUS TEXT DRIVER
// ============================================================================

/// ParseReport - quality flags for one parsed export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub encoding: String,
    pub confidence: EncodingConfidence,
    /// 0-based index of the first line treated as data
    pub data_start_line: usize,
    pub rows_seen: usize,
    /// Rows without code or value (headers, footers, annotations)
    pub rows_skipped: usize,
    pub duplicates_dropped: usize,
}

impl ParseReport {
    pub fn summary(&self) -> String {
        format!(
            "encoding {} ({:?}), data from line {}, {} rows, {} skipped, {} duplicates",
            self.encoding,
            self.confidence,
            self.data_start_line + 1,
            self.rows_seen,
            self.rows_skipped,
            self.duplicates_dropped
        )
    }
}

/// Parse a raw census export into deduplicated RegionRecords for one year
pub fn parse_census_text(bytes: &[u8], year: i32) -> (Vec<RegionRecord>, ParseReport) {
    let decoded = LineNormalizer::new().normalize(bytes);
    let data_start = find_data_start(&decoded.lines);
    let body = decoded.lines[data_start..].join("\n");

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    let mut rows_seen = 0;
    let mut rows_skipped = 0;

    for result in reader.records() {
        rows_seen += 1;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable CSV row skipped");
                rows_skipped += 1;
                continue;
            }
        };

        let cells: Vec<&str> = row.iter().collect();
        match classify_row(&cells) {
            Some(classified) => records.push(to_region_record(classified, year)),
            None => rows_skipped += 1,
        }
    }

    let (records, duplicates_dropped) = dedup_regions(records);

    let report = ParseReport {
        encoding: decoded.encoding.to_string(),
        confidence: decoded.confidence,
        data_start_line: data_start,
        rows_seen,
        rows_skipped,
        duplicates_dropped,
    };

    if decoded.confidence == EncodingConfidence::Degraded {
        tracing::warn!(year, "Census export decoded lossily: {}", report.summary());
    } else {
        tracing::debug!(year, "Census export parsed: {}", report.summary());
    }

    (records, report)
}

fn to_region_record(row: ClassifiedRow, year: i32) -> RegionRecord {
    let resolved = area::resolve(&row.code);
    let municipality = area::municipality_name(&row.code, &row.name);

    RegionRecord {
        code: row.code,
        prefecture: resolved.prefecture_name,
        municipality,
        year,
        value: row.value,
    }
}

// ============================================================================
// TESTS
// ============================================================================
