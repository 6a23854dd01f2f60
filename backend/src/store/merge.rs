//! Moves staged rows into the canonical tables.
//!
//! Every statement is an upsert keyed on the natural key of its table, so
//! running a merge again over the same staged rows converges to the same
//! state. When a key occurs several times in staging the most recently
//! staged row wins.

use crate::error::Result;
use registry_common::model::import::MergeCounts;
use rusqlite::{params, Connection};

const UPSERT_COMPANIES: &str = "
    INSERT INTO companies (org_number, year, owner_id, name, total_shares)
    SELECT org_number, year, owner_id, company_name, 0
    FROM staging_rows
    WHERE id IN (
        SELECT MAX(id) FROM staging_rows WHERE owner_id = ?1 GROUP BY org_number, year
    )
    ON CONFLICT (org_number, year, owner_id) DO UPDATE SET name = excluded.name";

const UPSERT_ENTITIES: &str = "
    INSERT INTO entities (owner_id, natural_key, entity_type, name, org_number, birth_year, country_code)
    SELECT owner_id, holder_key, holder_kind, holder_name, holder_org_number, holder_birth_year, country_code
    FROM staging_rows
    WHERE id IN (
        SELECT MAX(id) FROM staging_rows WHERE owner_id = ?1 GROUP BY holder_key
    )
    ON CONFLICT (owner_id, natural_key) DO UPDATE SET
        name = excluded.name,
        country_code = excluded.country_code";

const UPSERT_HOLDINGS: &str = "
    INSERT INTO holdings (company_org_number, holder_entity_id, share_class, year, owner_id, share_count)
    SELECT s.org_number, e.id, s.share_class, s.year, s.owner_id, s.share_count
    FROM staging_rows s
    JOIN entities e ON e.owner_id = s.owner_id AND e.natural_key = s.holder_key
    WHERE s.id IN (
        SELECT MAX(id) FROM staging_rows WHERE owner_id = ?1
        GROUP BY org_number, holder_key, share_class, year
    )
    ON CONFLICT (company_org_number, holder_entity_id, share_class, year, owner_id)
    DO UPDATE SET share_count = excluded.share_count";

/// Merge all staged rows of `owner_id` and empty the owner's staging area,
/// in a single transaction.
pub fn merge_batch(conn: &mut Connection, owner_id: &str) -> Result<MergeCounts> {
    let tx = conn.transaction()?;
    let companies = tx.execute(UPSERT_COMPANIES, params![owner_id])?;
    let entities = tx.execute(UPSERT_ENTITIES, params![owner_id])?;
    let holdings = tx.execute(UPSERT_HOLDINGS, params![owner_id])?;
    tx.execute("DELETE FROM staging_rows WHERE owner_id = ?1", params![owner_id])?;
    tx.commit()?;

    Ok(MergeCounts {
        companies: companies as u64,
        entities: entities as u64,
        holdings: holdings as u64,
    })
}

/// One holding as stored, joined with its holder's natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRecord {
    pub company_org_number: String,
    pub holder_key: String,
    pub share_class: String,
    pub year: i32,
    pub share_count: i64,
}

/// All holdings of an owner in a stable order.
pub fn holdings_for_owner(conn: &Connection, owner_id: &str) -> Result<Vec<HoldingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT h.company_org_number, e.natural_key, h.share_class, h.year, h.share_count
         FROM holdings h JOIN entities e ON e.id = h.holder_entity_id
         WHERE h.owner_id = ?1
         ORDER BY h.company_org_number, e.natural_key, h.share_class, h.year",
    )?;
    let rows = stmt
        .query_map(params![owner_id], |row| {
            Ok(HoldingRecord {
                company_org_number: row.get(0)?,
                holder_key: row.get(1)?,
                share_class: row.get(2)?,
                year: row.get(3)?,
                share_count: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn entity_count(conn: &Connection, owner_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entities WHERE owner_id = ?1",
        params![owner_id],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::staging::{stage_batch, staged_count};
    use crate::store::test_support::row;
    use crate::store::Database;
    use registry_common::model::shareholder::HolderIdentifier;

    fn sample() -> Vec<registry_common::model::shareholder::ShareholderRow> {
        vec![
            row("091234567", "Ola Nordmann", Some(HolderIdentifier::BirthYear(1980)), "A", 100),
            row("091234567", "Ola Nordmann", Some(HolderIdentifier::BirthYear(1980)), "B", 20),
            row("091234567", "Holding AS", Some(HolderIdentifier::OrgNumber("987654321".into())), "A", 900),
            row("912345678", "Holding AS", Some(HolderIdentifier::OrgNumber("987654321".into())), "A", 50),
        ]
    }

    #[test]
    fn merge_creates_one_record_per_natural_key() {
        let db = Database::open_in_memory().unwrap();
        let counts = db
            .with_conn(|c| {
                stage_batch(c, "o1", &sample())?;
                merge_batch(c, "o1")
            })
            .unwrap();
        assert_eq!(counts, MergeCounts { companies: 2, entities: 2, holdings: 4 });

        db.with_conn(|c| {
            assert_eq!(staged_count(c, "o1")?, 0);
            assert_eq!(entity_count(c, "o1")?, 2);
            let kind: String = c.query_row(
                "SELECT entity_type FROM entities WHERE natural_key = 'org:987654321'",
                [],
                |r| r.get(0),
            )?;
            assert_eq!(kind, "company");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn merging_the_same_rows_twice_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .with_conn(|c| {
                stage_batch(c, "o1", &sample())?;
                merge_batch(c, "o1")?;
                holdings_for_owner(c, "o1")
            })
            .unwrap();
        let second = db
            .with_conn(|c| {
                stage_batch(c, "o1", &sample())?;
                merge_batch(c, "o1")?;
                holdings_for_owner(c, "o1")
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn share_count_is_overwritten_not_added() {
        let db = Database::open_in_memory().unwrap();
        let holder = Some(HolderIdentifier::BirthYear(1980));
        let holdings = db
            .with_conn(|c| {
                stage_batch(c, "o1", &[row("091234567", "Ola", holder.clone(), "A", 100)])?;
                merge_batch(c, "o1")?;
                stage_batch(c, "o1", &[row("091234567", "Ola", holder.clone(), "A", 40)])?;
                merge_batch(c, "o1")?;
                holdings_for_owner(c, "o1")
            })
            .unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].share_count, 40);
    }

    #[test]
    fn last_staged_duplicate_wins_within_a_batch() {
        let db = Database::open_in_memory().unwrap();
        let holder = Some(HolderIdentifier::BirthYear(1980));
        let holdings = db
            .with_conn(|c| {
                stage_batch(
                    c,
                    "o1",
                    &[
                        row("091234567", "Ola", holder.clone(), "A", 100),
                        row("091234567", "Ola", holder.clone(), "A", 150),
                    ],
                )?;
                merge_batch(c, "o1")?;
                holdings_for_owner(c, "o1")
            })
            .unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].share_count, 150);
    }

    #[test]
    fn owners_do_not_see_each_other() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| {
            stage_batch(c, "o1", &sample())?;
            stage_batch(c, "o2", &sample()[..1])?;
            merge_batch(c, "o1")?;
            assert_eq!(holdings_for_owner(c, "o1")?.len(), 4);
            assert!(holdings_for_owner(c, "o2")?.is_empty());
            assert_eq!(staged_count(c, "o2")?, 1);
            Ok(())
        })
        .unwrap();
    }
}
