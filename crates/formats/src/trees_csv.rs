//! Tree survey CSV ingestion.
//!
//! Each data row ends up either as a loaded [`TreeRecord`] or as a rejected
//! row; both paths may leave [`RowIssue`]s behind so coercions are auditable
//! rather than silent.

use std::fmt;
use std::io::Read;

use foundation::ids::TreeId;
use serde::Serialize;
use survey::{TreeRecord, TreeSet};

const ID_HEADERS: &[&str] = &["立木ID", "id", "ID", "TreeID"];
const SPECIES_HEADERS: &[&str] = &["樹種", "Species"];
const DBH_HEADERS: &[&str] = &["胸高直径", "DBH"];
const GIRTH_HEADERS: &[&str] = &["幹周", "Girth"];
const HEIGHT_HEADERS: &[&str] = &["樹高", "Height"];
const VOLUME_HEADERS: &[&str] = &["材積", "Volume"];
const CUT_HEADERS: &[&str] = &["間伐", "Cut"];
const COMMENT_HEADERS: &[&str] = &["コメント", "備考", "Comment"];
const LON_HEADERS: &[&str] = &["経度", "lon", "Longitude"];
const LAT_HEADERS: &[&str] = &["緯度", "lat", "Latitude"];

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column: {0}")]
    MissingColumn(Field),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Field {
    Id,
    Species,
    Dbh,
    Height,
    Volume,
    Cut,
    Lon,
    Lat,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Id => "id",
            Field::Species => "species",
            Field::Dbh => "dbh",
            Field::Height => "height",
            Field::Volume => "volume",
            Field::Cut => "cut",
            Field::Lon => "lon",
            Field::Lat => "lat",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    /// The row was dropped.
    Rejected,
    /// The value was replaced by a default and the row kept.
    Coerced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    /// 1-based line in the source file (header is line 1).
    pub line: u64,
    pub field: Field,
    pub raw: String,
    pub kind: IssueKind,
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.kind {
            IssueKind::Rejected => "row rejected",
            IssueKind::Coerced => "coerced to default",
        };
        write!(f, "line {}: {} {:?}: {action}", self.line, self.field, self.raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub trees: TreeSet,
    pub issues: Vec<RowIssue>,
}

impl IngestReport {
    pub fn rejected_rows(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.kind == IssueKind::Rejected)
            .count()
    }

    pub fn coerced_values(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.kind == IssueKind::Coerced)
            .count()
    }
}

#[derive(Debug, Copy, Clone)]
struct Columns {
    id: Option<usize>,
    species: Option<usize>,
    dbh: Option<usize>,
    girth: Option<usize>,
    height: Option<usize>,
    volume: Option<usize>,
    cut: Option<usize>,
    comment: Option<usize>,
    lon: usize,
    lat: usize,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self, CsvError> {
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim().trim_start_matches('\u{feff}');
                names.iter().any(|n| h == *n)
            })
        };
        Ok(Self {
            id: find(ID_HEADERS),
            species: find(SPECIES_HEADERS),
            dbh: find(DBH_HEADERS),
            girth: find(GIRTH_HEADERS),
            height: find(HEIGHT_HEADERS),
            volume: find(VOLUME_HEADERS),
            cut: find(CUT_HEADERS),
            comment: find(COMMENT_HEADERS),
            lon: find(LON_HEADERS).ok_or(CsvError::MissingColumn(Field::Lon))?,
            lat: find(LAT_HEADERS).ok_or(CsvError::MissingColumn(Field::Lat))?,
        })
    }
}

pub fn parse_trees_csv(text: &str) -> Result<IngestReport, CsvError> {
    read_trees_csv(text.as_bytes())
}

pub fn read_trees_csv<R: Read>(reader: R) -> Result<IngestReport, CsvError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let cols = Columns::resolve(rdr.headers()?)?;

    let mut trees = Vec::new();
    let mut issues = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if let Some(tree) = ingest_row(&record, line, &cols, &mut issues) {
            trees.push(tree);
        }
    }

    let report = IngestReport {
        trees: TreeSet::new(trees),
        issues,
    };
    if report.issues.is_empty() {
        tracing::debug!(trees = report.trees.len(), "loaded tree csv");
    } else {
        tracing::warn!(
            trees = report.trees.len(),
            rejected = report.rejected_rows(),
            coerced = report.coerced_values(),
            "loaded tree csv with issues"
        );
    }
    Ok(report)
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    let v = record.get(idx?)?.trim();
    if v.is_empty() { None } else { Some(v) }
}

fn ingest_row(
    record: &csv::StringRecord,
    line: u64,
    cols: &Columns,
    issues: &mut Vec<RowIssue>,
) -> Option<TreeRecord> {
    let lon = coordinate(record, cols.lon, Field::Lon, 180.0, line, issues)?;
    let lat = coordinate(record, cols.lat, Field::Lat, 90.0, line, issues)?;

    let id = match cell(record, cols.id) {
        Some(id) => TreeId::new(id),
        None => {
            issues.push(RowIssue {
                line,
                field: Field::Id,
                raw: String::new(),
                kind: IssueKind::Coerced,
            });
            TreeId::new(format!("row-{line}"))
        }
    };

    let dbh_cm = match (cell(record, cols.dbh), cell(record, cols.girth)) {
        (None, Some(girth)) => {
            measure(Some(girth), Field::Dbh, line, issues) / core::f64::consts::PI
        }
        (dbh, _) => measure(dbh, Field::Dbh, line, issues),
    };

    Some(TreeRecord {
        id,
        species: cell(record, cols.species).unwrap_or_default().to_string(),
        dbh_cm,
        height_m: measure(cell(record, cols.height), Field::Height, line, issues),
        volume_m3: measure(cell(record, cols.volume), Field::Volume, line, issues),
        cut: cut_flag(cell(record, cols.cut), line, issues),
        comment: cell(record, cols.comment).unwrap_or_default().to_string(),
        lon,
        lat,
    })
}

fn coordinate(
    record: &csv::StringRecord,
    idx: usize,
    field: Field,
    limit: f64,
    line: u64,
    issues: &mut Vec<RowIssue>,
) -> Option<f64> {
    let raw = cell(record, Some(idx)).unwrap_or_default();
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Some(v),
        _ => {
            issues.push(RowIssue {
                line,
                field,
                raw: raw.to_string(),
                kind: IssueKind::Rejected,
            });
            None
        }
    }
}

/// Non-negative finite measurement, or 0 with an issue.
fn measure(raw: Option<&str>, field: Field, line: u64, issues: &mut Vec<RowIssue>) -> f64 {
    if let Some(v) = raw.and_then(|r| r.parse::<f64>().ok())
        && v.is_finite()
        && v >= 0.0
    {
        return v;
    }
    issues.push(RowIssue {
        line,
        field,
        raw: raw.unwrap_or_default().to_string(),
        kind: IssueKind::Coerced,
    });
    0.0
}

fn cut_flag(raw: Option<&str>, line: u64, issues: &mut Vec<RowIssue>) -> bool {
    match raw {
        None | Some("0") => false,
        Some("1") => true,
        Some(s) if s.eq_ignore_ascii_case("true") => true,
        Some(s) if s.eq_ignore_ascii_case("false") => false,
        Some(s) => {
            issues.push(RowIssue {
                line,
                field: Field::Cut,
                raw: s.to_string(),
                kind: IssueKind::Coerced,
            });
            false
        }
    }
}
