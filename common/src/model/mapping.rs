use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed set of fields a source column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    OrgNumber,
    CompanyName,
    HolderName,
    HolderOrgNumber,
    HolderBirthYear,
    /// Combined "birth year or org number" column.
    HolderIdentifier,
    CountryCode,
    ShareClass,
    ShareCount,
    Year,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::OrgNumber,
        CanonicalField::CompanyName,
        CanonicalField::HolderName,
        CanonicalField::HolderOrgNumber,
        CanonicalField::HolderBirthYear,
        CanonicalField::HolderIdentifier,
        CanonicalField::CountryCode,
        CanonicalField::ShareClass,
        CanonicalField::ShareCount,
        CanonicalField::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::OrgNumber => "orgNumber",
            CanonicalField::CompanyName => "companyName",
            CanonicalField::HolderName => "holderName",
            CanonicalField::HolderOrgNumber => "holderOrgNumber",
            CanonicalField::HolderBirthYear => "holderBirthYear",
            CanonicalField::HolderIdentifier => "holderIdentifier",
            CanonicalField::CountryCode => "countryCode",
            CanonicalField::ShareClass => "shareClass",
            CanonicalField::ShareCount => "shareCount",
            CanonicalField::Year => "year",
        }
    }
}

/// Explicit user mapping from a source header to a canonical field.
pub type FieldMapping = BTreeMap<String, CanonicalField>;
