use crate::error::Result;
use rusqlite::{params, Connection};
use serde::Serialize;

/// Recompute `total_shares` for every company of (`year`, `owner_id`) from the
/// current holdings. Always a full recompute, so the result does not depend on
/// batch order or retried batches. Returns the number of companies updated.
pub fn recompute_totals(conn: &Connection, year: i32, owner_id: &str) -> Result<u64> {
    let updated = conn.execute(
        "UPDATE companies
         SET total_shares = COALESCE((
             SELECT SUM(h.share_count) FROM holdings h
             WHERE h.company_org_number = companies.org_number
               AND h.year = companies.year
               AND h.owner_id = companies.owner_id
         ), 0)
         WHERE year = ?1 AND owner_id = ?2",
        params![year, owner_id],
    )?;
    Ok(updated as u64)
}

/// Years for which the owner has companies.
pub fn years_for_owner(conn: &Connection, owner_id: &str) -> Result<Vec<i32>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT year FROM companies WHERE owner_id = ?1 ORDER BY year")?;
    let years = stmt
        .query_map(params![owner_id], |r| r.get(0))?
        .collect::<std::result::Result<Vec<i32>, _>>()?;
    Ok(years)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySummary {
    pub org_number: String,
    pub name: String,
    pub year: i32,
    pub total_shares: i64,
}

pub fn company_totals(conn: &Connection, year: i32, owner_id: &str) -> Result<Vec<CompanySummary>> {
    let mut stmt = conn.prepare(
        "SELECT org_number, name, year, total_shares FROM companies
         WHERE year = ?1 AND owner_id = ?2 ORDER BY org_number",
    )?;
    let companies = stmt
        .query_map(params![year, owner_id], |row| {
            Ok(CompanySummary {
                org_number: row.get(0)?,
                name: row.get(1)?,
                year: row.get(2)?,
                total_shares: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::merge::merge_batch;
    use crate::store::staging::stage_batch;
    use crate::store::test_support::row;
    use crate::store::Database;
    use registry_common::model::shareholder::HolderIdentifier;

    #[test]
    fn totals_are_recomputed_from_holdings() {
        let db = Database::open_in_memory().unwrap();
        let ola = Some(HolderIdentifier::BirthYear(1980));
        let kari = Some(HolderIdentifier::BirthYear(1975));
        db.with_conn(|c| {
            stage_batch(c, "o1", &[row("091234567", "Ola", ola.clone(), "A", 100)])?;
            merge_batch(c, "o1")?;
            stage_batch(c, "o1", &[row("091234567", "Kari", kari.clone(), "A", 50)])?;
            merge_batch(c, "o1")?;
            assert_eq!(company_totals(c, 2024, "o1")?[0].total_shares, 0);

            assert_eq!(recompute_totals(c, 2024, "o1")?, 1);
            assert_eq!(company_totals(c, 2024, "o1")?[0].total_shares, 150);

            // Recomputing again never accumulates.
            recompute_totals(c, 2024, "o1")?;
            assert_eq!(company_totals(c, 2024, "o1")?[0].total_shares, 150);
            assert_eq!(years_for_owner(c, "o1")?, vec![2024]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn other_years_and_owners_are_untouched() {
        let db = Database::open_in_memory().unwrap();
        let ola = Some(HolderIdentifier::BirthYear(1980));
        db.with_conn(|c| {
            let mut older = row("091234567", "Ola", ola.clone(), "A", 10);
            older.year = 2023;
            stage_batch(c, "o1", &[older, row("091234567", "Ola", ola.clone(), "A", 100)])?;
            merge_batch(c, "o1")?;
            stage_batch(c, "o2", &[row("091234567", "Ola", ola.clone(), "A", 7)])?;
            merge_batch(c, "o2")?;

            recompute_totals(c, 2024, "o1")?;
            assert_eq!(company_totals(c, 2024, "o1")?[0].total_shares, 100);
            assert_eq!(company_totals(c, 2023, "o1")?[0].total_shares, 0);
            assert_eq!(company_totals(c, 2024, "o2")?[0].total_shares, 0);
            assert_eq!(years_for_owner(c, "o1")?, vec![2023, 2024]);
            Ok(())
        })
        .unwrap();
    }
}
