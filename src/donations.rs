//! Donation history unpacking for raw voter extracts.
//!
//! Raw voter rows carry their donation history in one packed field shaped
//! `{$12@01/02/2020,$5@2019}`. The transform expands it into summary
//! columns and flags donors.

use crate::constants::{UNKNOWN_PARTY, columns};
use crate::error::BoxError;
use crate::models::{Frame, Value};
use crate::processor::transform::ChunkTransform;
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PACKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[{}$]").expect("static regex is valid"));
static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("static regex is valid"));
static MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{4})$").expect("static regex is valid"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("static regex is valid"));

#[derive(Error, Debug, PartialEq)]
pub enum DonationParseError {
    #[error("donation entry `{0}` is not shaped amount@date")]
    Entry(String),

    #[error("donation amount `{0}` is not a number")]
    Amount(String),

    #[error("donation date `{0}` matches no known date shape")]
    Date(String),
}

/// Summary of one packed donation history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DonationSummary {
    pub total: f64,
    pub avg: f64,
    /// Days since the first listed donation, -1 without donations
    pub days_since: i64,
}

impl Default for DonationSummary {
    fn default() -> Self {
        Self {
            total: 0.0,
            avg: 0.0,
            days_since: -1,
        }
    }
}

/// Parse a donation date: `MM/DD/YYYY`, `MM/YYYY` (day 1) or `YYYY` (Jan 1)
pub fn parse_donation_date(raw: &str) -> Result<NaiveDate, DonationParseError> {
    let raw = raw.trim();
    let parsed = if FULL_DATE.is_match(raw) {
        NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok()
    } else if let Some(caps) = MONTH_YEAR.captures(raw) {
        let month = caps[1].parse().ok();
        let year = caps[2].parse().ok();
        month.zip(year).and_then(|(m, y)| NaiveDate::from_ymd_opt(y, m, 1))
    } else if YEAR.is_match(raw) {
        raw.parse().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1))
    } else {
        None
    };
    parsed.ok_or_else(|| DonationParseError::Date(raw.to_string()))
}

/// Unpack a packed donation field relative to `reference`
pub fn unpack_donations(
    packed: &str,
    reference: NaiveDate,
) -> Result<DonationSummary, DonationParseError> {
    let stripped = PACKING.replace_all(packed, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return Ok(DonationSummary::default());
    }

    let mut amounts = Vec::new();
    let mut first_date = None;
    for entry in stripped.split(',') {
        let (amount, date) = entry
            .split_once('@')
            .ok_or_else(|| DonationParseError::Entry(entry.to_string()))?;
        let amount: f64 = amount
            .trim()
            .parse()
            .map_err(|_| DonationParseError::Amount(amount.to_string()))?;
        amounts.push(amount);
        if first_date.is_none() {
            first_date = Some(parse_donation_date(date)?);
        }
    }

    let total: f64 = amounts.iter().sum();
    let days_since = first_date
        .map(|date| (reference - date).num_days())
        .unwrap_or(-1);
    Ok(DonationSummary {
        total,
        avg: total / amounts.len() as f64,
        days_since,
    })
}

/// Prepares raw voter chunks: adds `total`, `avg`, `days_since` and
/// `is_donor`, and fills a missing party affiliation with `X`.
#[derive(Debug, Clone)]
pub struct DonationTransform {
    reference_date: NaiveDate,
}

impl Default for DonationTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl DonationTransform {
    /// Measure donation age against today
    pub fn new() -> Self {
        Self {
            reference_date: Local::now().date_naive(),
        }
    }

    pub fn with_reference_date(mut self, reference_date: NaiveDate) -> Self {
        self.reference_date = reference_date;
        self
    }
}

impl ChunkTransform for DonationTransform {
    fn name(&self) -> &str {
        "donations"
    }

    fn apply(&self, mut chunk: Frame) -> Result<Frame, BoxError> {
        let packed = chunk.column(columns::DEM_DONATION_AMOUNTS)?;

        let mut totals = Vec::with_capacity(packed.len());
        let mut avgs = Vec::with_capacity(packed.len());
        let mut days = Vec::with_capacity(packed.len());
        let mut donors = Vec::with_capacity(packed.len());
        for value in packed {
            let summary = match value {
                Value::Null => DonationSummary::default(),
                other => unpack_donations(&other.to_string(), self.reference_date)?,
            };
            totals.push(Value::Real(summary.total));
            avgs.push(Value::Real(summary.avg));
            days.push(Value::Integer(summary.days_since));
            donors.push(Value::Integer(i64::from(summary.total > 0.0)));
        }

        chunk.set_column(columns::DONATION_SUM, totals)?;
        chunk.set_column(columns::DONATION_AVG, avgs)?;
        chunk.set_column(columns::DAYS_SINCE, days)?;
        chunk.set_column(columns::IS_DONOR, donors)?;

        if chunk.position(columns::PARTY_AFFILIATION).is_some() {
            chunk.map_column(columns::PARTY_AFFILIATION, |value| match value {
                Value::Null => Value::from(UNKNOWN_PARTY),
                other => other.clone(),
            })?;
        }

        Ok(chunk)
    }
}
