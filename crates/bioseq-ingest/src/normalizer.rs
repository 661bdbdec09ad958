//! Record normalizer
//!
//! Maps a [`RawRecord`] onto the canonical column set.
//!
//! Rules:
//! - a row without a row index (`ID`) is [`Normalized::Dropped`], which is not
//!   an error and is not deduplication
//! - `id`, `seq` and `origin` are required; a missing one yields
//!   [`MissingFieldError`]
//! - numeric and date fields are lenient by default: absent or unparseable
//!   values become null
//! - dates are read as `day/month/year`; ISO `YYYY-MM-DD` input is accepted
//!   unchanged

use chrono::NaiveDate;

use crate::error::{MissingFieldError, NormalizeError};
use crate::models::{self, CanonicalRecord, ColumnSpec, ColumnVariant, RawRecord, ROW_INDEX_COLUMN};

/// Accepted date layouts, tried in order
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

/// Result of normalizing one row
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(Box<CanonicalRecord>),
    /// Row index missing; the row never reaches the loader
    Dropped,
}

/// Parse a float, returning `None` for absent or unparseable input
pub fn parse_float(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
}

/// Parse a `day/month/year` (or ISO) date, returning `None` for blank or
/// unparseable input
pub fn normalize_date(raw: Option<&str>) -> Option<NaiveDate> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Converts raw rows into canonical records for one column variant
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    variant: ColumnVariant,
    strict_values: bool,
}

impl Normalizer {
    /// Lenient normalizer
    pub fn new(variant: ColumnVariant) -> Self {
        Self {
            variant,
            strict_values: false,
        }
    }

    /// Reject unparseable numeric and date values instead of nulling them
    pub fn with_strict_values(mut self, strict: bool) -> Self {
        self.strict_values = strict;
        self
    }

    pub fn variant(&self) -> ColumnVariant {
        self.variant
    }

    pub fn normalize(&self, raw: &RawRecord) -> Result<Normalized, NormalizeError> {
        if raw.get(ROW_INDEX_COLUMN).is_none() {
            return Ok(Normalized::Dropped);
        }

        let mut record = CanonicalRecord {
            sequence_id: required(raw, &models::SEQUENCE_ID, "sequence_id")?,
            sequence: required(raw, &models::SEQUENCE, "sequence")?,
            origin: required(raw, &models::ORIGIN, "origin")?,
            asn_deamidation_risk_count: self.float(
                raw,
                &models::ASN_DEAMIDATION_RISK,
                "asn_deamidation_risk_count",
            )?,
            cysteine_count: self.float(raw, &models::CYSTEINE, "cysteine_count")?,
            isomerization_count: self.float(raw, &models::ISOMERIZATION, "isomerization_count")?,
            methionine_count: self.float(raw, &models::METHIONINE, "methionine_count")?,
            n_glycosylation_count: self.float(
                raw,
                &models::N_GLYCOSYLATION,
                "n_glycosylation_count",
            )?,
            proline_count: self.float(raw, &models::PROLINE, "proline_count")?,
            strong_deamidation_count: self.float(
                raw,
                &models::STRONG_DEAMIDATION,
                "strong_deamidation_count",
            )?,
            weak_deamidation_count: self.float(
                raw,
                &models::WEAK_DEAMIDATION,
                "weak_deamidation_count",
            )?,
            sequence_type: text(raw, &models::SEQUENCE_TYPE),
            stoichiometry: self.float(raw, &models::STOICHIOMETRY, "stoichiometry")?,
            antibody_format: text(raw, &models::ANTIBODY_FORMAT),
            antibody_isotype: text(raw, &models::ANTIBODY_ISOTYPE),
            project_name: None,
            date_created: None,
        };

        if self.variant == ColumnVariant::Project {
            record.project_name = text(raw, &models::PROJECT_NAME);
            record.date_created = self.date(raw, &models::DATE_CREATED, "date_created")?;
        }

        Ok(Normalized::Record(Box::new(record)))
    }

    fn float(
        &self,
        raw: &RawRecord,
        column: &'static ColumnSpec,
        field: &'static str,
    ) -> Result<Option<f64>, NormalizeError> {
        let value = raw.get(column.source);
        match parse_float(value) {
            None if self.strict_values && value.is_some() => {
                Err(invalid(column, field, value.unwrap_or_default()))
            },
            parsed => Ok(parsed),
        }
    }

    fn date(
        &self,
        raw: &RawRecord,
        column: &'static ColumnSpec,
        field: &'static str,
    ) -> Result<Option<NaiveDate>, NormalizeError> {
        let value = raw.get(column.source);
        match normalize_date(value) {
            None if self.strict_values && value.is_some() => {
                Err(invalid(column, field, value.unwrap_or_default()))
            },
            parsed => Ok(parsed),
        }
    }
}

fn required(
    raw: &RawRecord,
    column: &'static ColumnSpec,
    field: &'static str,
) -> Result<String, MissingFieldError> {
    raw.get(column.source)
        .map(str::to_string)
        .ok_or(MissingFieldError {
            field,
            column: column.source,
        })
}

fn text(raw: &RawRecord, column: &ColumnSpec) -> Option<String> {
    raw.get(column.source).map(str::to_string)
}

fn invalid(column: &'static ColumnSpec, field: &'static str, value: &str) -> NormalizeError {
    NormalizeError::InvalidValue {
        field,
        column: column.source,
        value: value.to_string(),
    }
}
