//! Row normalizer: maps raw rows with arbitrary headers onto canonical
//! shareholder rows.
//!
//! Columns are resolved once per header set (`ColumnResolver`): explicit user
//! mapping first, then a ranked alias list per field. Header comparison
//! ignores case, accents and punctuation.

use crate::pipeline::reader::RawRow;
use rayon::prelude::*;
use regex::Regex;
use registry_common::jobs::RejectionSample;
use registry_common::model::mapping::{CanonicalField, FieldMapping};
use registry_common::model::shareholder::{HolderIdentifier, ShareholderRow};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const DEFAULT_COUNTRY: &str = "NO";
pub const DEFAULT_SHARE_CLASS: &str = "A";
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Known header spellings per field, already in `header_key` form, most
/// specific first.
const ALIASES: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::OrgNumber,
        &["orgnr", "organisasjonsnummer", "orgnummer", "selskapsorgnr", "orgnumber", "organizationnumber", "companyorgnumber"],
    ),
    (
        CanonicalField::CompanyName,
        &["selskap", "selskapsnavn", "foretaksnavn", "companyname", "company"],
    ),
    (
        CanonicalField::HolderName,
        &["navnaksjonaer", "aksjonaernavn", "aksjonaer", "shareholdername", "shareholder", "holdername", "navn"],
    ),
    (
        CanonicalField::HolderIdentifier,
        &["fodselsarorgnr", "fodselsaarorgnr", "fodselsarorgnummer", "birthyearorgnr", "birthyearorgnumber"],
    ),
    (
        CanonicalField::HolderOrgNumber,
        &["aksjonaerorgnr", "shareholderorgnumber", "holderorgnumber"],
    ),
    (
        CanonicalField::HolderBirthYear,
        &["fodselsar", "fodselsaar", "birthyear", "holderbirthyear"],
    ),
    (
        CanonicalField::CountryCode,
        &["landkode", "land", "countrycode", "country"],
    ),
    (
        CanonicalField::ShareClass,
        &["aksjeklasse", "klasse", "shareclass", "class"],
    ),
    (
        CanonicalField::ShareCount,
        &["antallaksjer", "aksjer", "antall", "numberofshares", "sharecount", "shares"],
    ),
    (
        CanonicalField::Year,
        &["ar", "aar", "regnskapsar", "inntektsar", "year"],
    ),
];

/// Fields without which no row can be accepted.
const REQUIRED: [CanonicalField; 4] = [
    CanonicalField::OrgNumber,
    CanonicalField::CompanyName,
    CanonicalField::HolderName,
    CanonicalField::ShareCount,
];

/// Why a row was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidOrgNumber(String),
    MissingCompanyName,
    MissingHolderName,
    InvalidShareCount(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidOrgNumber(raw) => write!(f, "invalid org number '{}'", raw),
            RejectReason::MissingCompanyName => write!(f, "company name is empty"),
            RejectReason::MissingHolderName => write!(f, "shareholder name is empty"),
            RejectReason::InvalidShareCount(raw) => {
                write!(f, "share count '{}' is not a positive integer", raw)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Row(ShareholderRow),
    Rejected(RejectReason),
}

/// Fold a header for comparison: strip accents, lowercase, keep only
/// letters and digits.
pub fn header_key(header: &str) -> String {
    header
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .flat_map(|c| match c {
            'ø' => vec!['o'],
            'æ' => vec!['a', 'e'],
            'ß' => vec!['s', 's'],
            other => vec![other],
        })
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Keep digits only; 8 digits get the leading zero back.
pub fn normalize_org_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        9 => Some(digits),
        8 => Some(format!("0{}", digits)),
        _ => None,
    }
}

fn thousands_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,3}([.,]\d{3})+$").ok())
        .as_ref()
}

fn whole_decimal_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d+)[.,]0+$").ok()).as_ref()
}

/// Parse a share count, accepting grouping spaces, thousand separators and
/// a zero fraction.
pub fn parse_share_count(raw: &str) -> Option<i64> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00A0}' && *c != '\u{202F}')
        .collect();
    if compact.is_empty() {
        return None;
    }
    if let Ok(n) = compact.parse::<i64>() {
        return Some(n);
    }
    if thousands_re().is_some_and(|re| re.is_match(&compact)) {
        let digits: String = compact.chars().filter(|c| c.is_ascii_digit()).collect();
        return digits.parse().ok();
    }
    whole_decimal_re()
        .and_then(|re| re.captures(&compact))
        .and_then(|caps| caps[1].parse().ok())
}

fn parse_year(raw: &str) -> Option<i32> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .filter(|y| (MIN_YEAR..=MAX_YEAR).contains(y))
}

/// Interpret the combined "birth year or org number" column: a plausible
/// year is a birth year, otherwise the digits are read as an org number
/// (separators ignored, 8 digits padded). Anything else is left unset.
pub fn parse_holder_identifier(raw: &str) -> Option<HolderIdentifier> {
    if let Some(year) = parse_year(raw) {
        return Some(HolderIdentifier::BirthYear(year));
    }
    normalize_org_number(raw).map(HolderIdentifier::OrgNumber)
}

/// Column positions of the canonical fields for one header set.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    columns: BTreeMap<CanonicalField, usize>,
}

impl ColumnResolver {
    pub fn new(headers: &[String], mapping: &FieldMapping) -> Self {
        let keys: Vec<String> = headers.iter().map(|h| header_key(h)).collect();
        let mut columns = BTreeMap::new();
        let mut claimed = HashSet::new();

        for (source_header, field) in mapping {
            if columns.contains_key(field) {
                continue;
            }
            let wanted = header_key(source_header);
            let position = headers
                .iter()
                .position(|h| h == source_header)
                .or_else(|| keys.iter().position(|k| *k == wanted));
            if let Some(idx) = position {
                if claimed.insert(idx) {
                    columns.insert(*field, idx);
                }
            }
        }

        for (field, aliases) in ALIASES {
            if columns.contains_key(field) {
                continue;
            }
            let found = aliases.iter().find_map(|alias| {
                keys.iter()
                    .enumerate()
                    .find(|(idx, key)| key.as_str() == *alias && !claimed.contains(idx))
                    .map(|(idx, _)| idx)
            });
            if let Some(idx) = found {
                claimed.insert(idx);
                columns.insert(*field, idx);
            }
        }

        Self { columns }
    }

    pub fn column(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Required fields no column resolved to.
    pub fn missing_required(&self) -> Vec<CanonicalField> {
        REQUIRED
            .iter()
            .copied()
            .filter(|f| !self.columns.contains_key(f))
            .collect()
    }

    fn value<'a>(&self, values: &'a [String], field: CanonicalField) -> &'a str {
        self.column(field)
            .and_then(|idx| values.get(idx))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    pub fn normalize(&self, values: &[String], default_year: i32) -> Normalized {
        let raw_org = self.value(values, CanonicalField::OrgNumber);
        let org_number = match normalize_org_number(raw_org) {
            Some(org) => org,
            None => return Normalized::Rejected(RejectReason::InvalidOrgNumber(raw_org.to_string())),
        };

        let company_name = self.value(values, CanonicalField::CompanyName);
        if company_name.is_empty() {
            return Normalized::Rejected(RejectReason::MissingCompanyName);
        }
        let holder_name = self.value(values, CanonicalField::HolderName);
        if holder_name.is_empty() {
            return Normalized::Rejected(RejectReason::MissingHolderName);
        }

        let raw_count = self.value(values, CanonicalField::ShareCount);
        let share_count = match parse_share_count(raw_count) {
            Some(n) if n > 0 => n,
            _ => return Normalized::Rejected(RejectReason::InvalidShareCount(raw_count.to_string())),
        };

        let holder_id = normalize_org_number(self.value(values, CanonicalField::HolderOrgNumber))
            .map(HolderIdentifier::OrgNumber)
            .or_else(|| {
                parse_year(self.value(values, CanonicalField::HolderBirthYear))
                    .map(HolderIdentifier::BirthYear)
            })
            .or_else(|| parse_holder_identifier(self.value(values, CanonicalField::HolderIdentifier)));

        let country = self.value(values, CanonicalField::CountryCode);
        let share_class = self.value(values, CanonicalField::ShareClass);

        Normalized::Row(ShareholderRow {
            org_number,
            company_name: company_name.to_string(),
            holder_name: holder_name.to_string(),
            holder_id,
            country_code: if country.is_empty() {
                DEFAULT_COUNTRY.to_string()
            } else {
                country.to_uppercase()
            },
            share_class: if share_class.is_empty() {
                DEFAULT_SHARE_CLASS.to_string()
            } else {
                share_class.to_string()
            },
            share_count,
            year: parse_year(self.value(values, CanonicalField::Year)).unwrap_or(default_year),
        })
    }
}

/// Normalize a single row given as header -> value pairs.
pub fn normalize(raw: &BTreeMap<String, String>, mapping: &FieldMapping, default_year: i32) -> Normalized {
    let headers: Vec<String> = raw.keys().cloned().collect();
    let values: Vec<String> = raw.values().cloned().collect();
    ColumnResolver::new(&headers, mapping).normalize(&values, default_year)
}

/// Normalized rows of a batch plus samples of what was dropped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub rows: Vec<ShareholderRow>,
    pub rejected: u64,
    pub rejections: Vec<RejectionSample>,
}

/// Normalize a batch in parallel, keeping source order. At most
/// `max_samples` rejection samples are kept.
pub fn normalize_batch(
    resolver: &ColumnResolver,
    rows: &[RawRow],
    default_year: i32,
    max_samples: usize,
) -> NormalizedBatch {
    let results: Vec<(u64, Normalized)> = rows
        .par_iter()
        .map(|row| (row.source_row, resolver.normalize(&row.values, default_year)))
        .collect();

    let mut batch = NormalizedBatch::default();
    for (source_row, result) in results {
        match result {
            Normalized::Row(row) => batch.rows.push(row),
            Normalized::Rejected(reason) => {
                log::debug!("Row {} rejected: {}", source_row, reason);
                batch.rejected += 1;
                if batch.rejections.len() < max_samples {
                    batch.rejections.push(RejectionSample {
                        source_row,
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }
    batch
}
