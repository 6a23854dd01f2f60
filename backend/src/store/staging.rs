use crate::error::Result;
use registry_common::model::shareholder::ShareholderRow;
use rusqlite::{params, Connection};

/// Remove every staged row of an owner. Called once when a job starts so a
/// crashed earlier run cannot leak rows into the next merge.
pub fn clear_staging(conn: &Connection, owner_id: &str) -> Result<u64> {
    let removed = conn.execute(
        "DELETE FROM staging_rows WHERE owner_id = ?1",
        params![owner_id],
    )?;
    Ok(removed as u64)
}

/// Bulk-insert normalized rows in one transaction.
///
/// There is no uniqueness constraint on staging: the same holding may be
/// staged twice (a retried batch) and the merge resolves it.
pub fn stage_batch(conn: &mut Connection, owner_id: &str, rows: &[ShareholderRow]) -> Result<u64> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO staging_rows (
                owner_id, org_number, company_name, holder_name, holder_key, holder_kind,
                holder_org_number, holder_birth_year, country_code, share_class, share_count, year
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for row in rows {
            stmt.execute(params![
                owner_id,
                row.org_number,
                row.company_name.trim(),
                row.holder_name.trim(),
                row.holder_key(),
                row.holder_kind().as_str(),
                row.holder_org_number(),
                row.holder_birth_year(),
                row.country_code,
                row.share_class,
                row.share_count,
                row.year,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len() as u64)
}

pub fn staged_count(conn: &Connection, owner_id: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM staging_rows WHERE owner_id = ?1",
        params![owner_id],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}
