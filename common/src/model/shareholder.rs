use serde::{Deserialize, Serialize};

/// How a shareholder is identified besides its name.
///
/// Registry exports carry a single "birth year or org number" column, so a
/// holder has at most one of the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HolderIdentifier {
    OrgNumber(String),
    BirthYear(i32),
}

/// A fully normalized shareholder row, ready for staging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareholderRow {
    pub org_number: String,
    pub company_name: String,
    pub holder_name: String,
    pub holder_id: Option<HolderIdentifier>,
    pub country_code: String,
    pub share_class: String,
    pub share_count: i64,
    pub year: i32,
}

impl ShareholderRow {
    pub fn holder_org_number(&self) -> Option<&str> {
        match &self.holder_id {
            Some(HolderIdentifier::OrgNumber(org)) => Some(org.as_str()),
            _ => None,
        }
    }

    pub fn holder_birth_year(&self) -> Option<i32> {
        match self.holder_id {
            Some(HolderIdentifier::BirthYear(year)) => Some(year),
            _ => None,
        }
    }

    /// Natural key of the holder entity: the org number when known,
    /// otherwise name plus birth year.
    pub fn holder_key(&self) -> String {
        match &self.holder_id {
            Some(HolderIdentifier::OrgNumber(org)) => format!("org:{}", org),
            Some(HolderIdentifier::BirthYear(year)) => {
                format!("person:{}|{}", self.holder_name.trim(), year)
            }
            None => format!("person:{}|", self.holder_name.trim()),
        }
    }

    pub fn holder_kind(&self) -> EntityKind {
        match self.holder_id {
            Some(HolderIdentifier::OrgNumber(_)) => EntityKind::Company,
            _ => EntityKind::Person,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Person,
    Company,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Company => "company",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(holder_id: Option<HolderIdentifier>) -> ShareholderRow {
        ShareholderRow {
            org_number: "091234567".to_string(),
            company_name: "Test AS".to_string(),
            holder_name: " Ola Nordmann ".to_string(),
            holder_id,
            country_code: "NO".to_string(),
            share_class: "A".to_string(),
            share_count: 100,
            year: 2024,
        }
    }

    #[test]
    fn holder_key_prefers_org_number() {
        let company = row(Some(HolderIdentifier::OrgNumber("987654321".into())));
        assert_eq!(company.holder_key(), "org:987654321");
        assert_eq!(company.holder_kind(), EntityKind::Company);

        let person = row(Some(HolderIdentifier::BirthYear(1980)));
        assert_eq!(person.holder_key(), "person:Ola Nordmann|1980");
        assert_eq!(person.holder_kind(), EntityKind::Person);

        assert_eq!(row(None).holder_key(), "person:Ola Nordmann|");
    }
}
