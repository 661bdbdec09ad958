//! Sequence record models
//!
//! Defines the recognized CSV columns, the raw per-row mapping produced by the
//! CSV reader, and the canonical record handed to the loader.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bioseq_common::BioseqError;

/// Row-index column. Only decides whether a row is accepted; it is not a key.
pub const ROW_INDEX_COLUMN: &str = "ID";

/// Cell values the reader treats as null, in addition to blank cells
const NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Store column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// Bounded string, `VARCHAR(255)`
    Varchar,
    Text,
    Float,
    Date,
}

impl SqlType {
    /// Longest value accepted by a `VARCHAR` column
    pub const VARCHAR_LIMIT: usize = 255;

    pub fn ddl(self) -> &'static str {
        match self {
            SqlType::Varchar => "VARCHAR(255)",
            SqlType::Text => "TEXT",
            SqlType::Float => "FLOAT",
            SqlType::Date => "DATE",
        }
    }
}

/// Mapping of one CSV column onto one store column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Exact, case-sensitive CSV header name
    pub source: &'static str,
    /// Column name in the target table
    pub store: &'static str,
    pub sql_type: SqlType,
    pub required: bool,
}

const fn column(
    source: &'static str,
    store: &'static str,
    sql_type: SqlType,
    required: bool,
) -> ColumnSpec {
    ColumnSpec {
        source,
        store,
        sql_type,
        required,
    }
}

pub const SEQUENCE_ID: ColumnSpec = column("id", "Sequence_ID", SqlType::Varchar, true);
pub const SEQUENCE: ColumnSpec = column("seq", "Nucleotide_Sequence", SqlType::Text, true);
pub const ORIGIN: ColumnSpec = column("origin", "Sequence_Origin", SqlType::Text, true);
pub const ASN_DEAMIDATION_RISK: ColumnSpec = column(
    "Asn - deamidation risk Cnt",
    "Asn_Deamidation_Risk_Count",
    SqlType::Float,
    false,
);
pub const CYSTEINE: ColumnSpec = column("Cys Cnt", "Cysteine_Count", SqlType::Float, false);
pub const ISOMERIZATION: ColumnSpec =
    column("Isomerization Cnt", "Isomerization_Count", SqlType::Float, false);
pub const METHIONINE: ColumnSpec = column("Met Cnt", "Methionine_Count", SqlType::Float, false);
pub const N_GLYCOSYLATION: ColumnSpec =
    column("N-Glycosylation Cnt", "N_Glycosylation_Count", SqlType::Float, false);
pub const PROLINE: ColumnSpec = column("Pro Cnt", "Proline_Count", SqlType::Float, false);
pub const STRONG_DEAMIDATION: ColumnSpec = column(
    "Strong Deamidation Cnt",
    "Strong_Deamidation_Count",
    SqlType::Float,
    false,
);
pub const WEAK_DEAMIDATION: ColumnSpec =
    column("Weak Deamidation Cnt", "Weak_Deamidation_Count", SqlType::Float, false);
pub const SEQUENCE_TYPE: ColumnSpec =
    column("SEQUENCE_TYPE", "Sequence_Type", SqlType::Varchar, false);
pub const STOICHIOMETRY: ColumnSpec =
    column("STOICHIOMETRY", "Stoichiometry", SqlType::Float, false);
pub const ANTIBODY_FORMAT: ColumnSpec =
    column("Format", "Antibody_Format", SqlType::Varchar, false);
pub const ANTIBODY_ISOTYPE: ColumnSpec =
    column("Isotype", "Antibody_Isotype", SqlType::Varchar, false);
pub const PROJECT_NAME: ColumnSpec = column("Project", "Project_Name", SqlType::Varchar, false);
pub const DATE_CREATED: ColumnSpec = column("DATE_CREATED", "Date_Created", SqlType::Date, false);

/// Canonical columns shared by both variants, in insertion order
pub static STANDARD_COLUMNS: [ColumnSpec; 15] = [
    SEQUENCE_ID,
    SEQUENCE,
    ORIGIN,
    ASN_DEAMIDATION_RISK,
    CYSTEINE,
    ISOMERIZATION,
    METHIONINE,
    N_GLYCOSYLATION,
    PROLINE,
    STRONG_DEAMIDATION,
    WEAK_DEAMIDATION,
    SEQUENCE_TYPE,
    STOICHIOMETRY,
    ANTIBODY_FORMAT,
    ANTIBODY_ISOTYPE,
];

/// Columns appended by the project variant
pub static PROJECT_COLUMNS: [ColumnSpec; 2] = [PROJECT_NAME, DATE_CREATED];

/// Which recognized column set a file (and the target table) uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnVariant {
    /// 15 canonical columns
    #[default]
    Standard,
    /// Standard columns plus `Project` and `DATE_CREATED`
    Project,
}

impl ColumnVariant {
    /// Canonical columns in insertion order
    pub fn columns(self) -> impl Iterator<Item = &'static ColumnSpec> {
        let extra: &'static [ColumnSpec] = match self {
            ColumnVariant::Standard => &[],
            ColumnVariant::Project => &PROJECT_COLUMNS,
        };
        STANDARD_COLUMNS.iter().chain(extra.iter())
    }

    /// Every header the reader keeps: the row index plus the canonical sources
    pub fn recognized_columns(self) -> Vec<&'static str> {
        std::iter::once(ROW_INDEX_COLUMN)
            .chain(self.columns().map(|c| c.source))
            .collect()
    }

    /// Headers a file must carry to be ingested at all
    pub fn required_headers(self) -> Vec<&'static str> {
        std::iter::once(ROW_INDEX_COLUMN)
            .chain(self.columns().filter(|c| c.required).map(|c| c.source))
            .collect()
    }

    pub fn column_count(self) -> usize {
        self.columns().count()
    }
}

impl std::str::FromStr for ColumnVariant {
    type Err = BioseqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "base" => Ok(ColumnVariant::Standard),
            "project" | "continuous" => Ok(ColumnVariant::Project),
            _ => Err(BioseqError::invalid_setting(
                "column variant",
                s,
                "expected 'standard' or 'project'",
            )),
        }
    }
}

impl std::fmt::Display for ColumnVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnVariant::Standard => f.write_str("standard"),
            ColumnVariant::Project => f.write_str("project"),
        }
    }
}

/// One CSV row restricted to recognized columns, in header order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    line: u64,
    fields: Vec<(String, String)>,
}

impl RawRecord {
    /// Create an empty record for the given 1-based file line
    pub fn new(line: u64) -> Self {
        Self {
            line,
            fields: Vec::new(),
        }
    }

    /// Build a record from `(column, value)` pairs
    pub fn from_pairs<I, K, V>(line: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new(line);
        for (column, value) in pairs {
            record.insert(column, value);
        }
        record
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    /// Value of `column`, or `None` when the column is absent or the cell is null
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.trim())
            .filter(|value| !is_null_token(value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Whether a trimmed cell represents a missing value
pub fn is_null_token(value: &str) -> bool {
    value.is_empty() || NULL_TOKENS.contains(&value)
}

/// One normalized sequence entry, ready for insertion
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CanonicalRecord {
    pub sequence_id: String,
    pub sequence: String,
    pub origin: String,
    pub asn_deamidation_risk_count: Option<f64>,
    pub cysteine_count: Option<f64>,
    pub isomerization_count: Option<f64>,
    pub methionine_count: Option<f64>,
    pub n_glycosylation_count: Option<f64>,
    pub proline_count: Option<f64>,
    pub strong_deamidation_count: Option<f64>,
    pub weak_deamidation_count: Option<f64>,
    pub sequence_type: Option<String>,
    pub stoichiometry: Option<f64>,
    pub antibody_format: Option<String>,
    pub antibody_isotype: Option<String>,
    pub project_name: Option<String>,
    pub date_created: Option<NaiveDate>,
}

/// A single bound parameter of an insert
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnValue<'a> {
    Text(Option<&'a str>),
    Float(Option<f64>),
    Date(Option<NaiveDate>),
}

impl ColumnValue<'_> {
    pub fn is_null(&self) -> bool {
        match self {
            ColumnValue::Text(v) => v.is_none(),
            ColumnValue::Float(v) => v.is_none(),
            ColumnValue::Date(v) => v.is_none(),
        }
    }
}

impl CanonicalRecord {
    /// Field values in the insertion order of `variant`
    pub fn values(&self, variant: ColumnVariant) -> Vec<ColumnValue<'_>> {
        let mut values = vec![
            ColumnValue::Text(Some(self.sequence_id.as_str())),
            ColumnValue::Text(Some(self.sequence.as_str())),
            ColumnValue::Text(Some(self.origin.as_str())),
            ColumnValue::Float(self.asn_deamidation_risk_count),
            ColumnValue::Float(self.cysteine_count),
            ColumnValue::Float(self.isomerization_count),
            ColumnValue::Float(self.methionine_count),
            ColumnValue::Float(self.n_glycosylation_count),
            ColumnValue::Float(self.proline_count),
            ColumnValue::Float(self.strong_deamidation_count),
            ColumnValue::Float(self.weak_deamidation_count),
            ColumnValue::Text(self.sequence_type.as_deref()),
            ColumnValue::Float(self.stoichiometry),
            ColumnValue::Text(self.antibody_format.as_deref()),
            ColumnValue::Text(self.antibody_isotype.as_deref()),
        ];

        if variant == ColumnVariant::Project {
            values.push(ColumnValue::Text(self.project_name.as_deref()));
            values.push(ColumnValue::Date(self.date_created));
        }

        values
    }
}
