//! borrower_features table queries
//!
//! One JSON-typed row per case, upserted on every assembly.

use lendcase_core::error::Result;
use lendcase_core::model::BorrowerFeatureVector;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::sqe;

/// Upsert the feature vector for its case
pub fn upsert(conn: &Connection, vector: &BorrowerFeatureVector) -> Result<()> {
    let payload = serde_json::to_string(vector).map_err(sqe)?;
    conn.prepare_cached(
        "INSERT INTO borrower_features (case_id, payload, feature_completeness, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(case_id) DO UPDATE SET
           payload = excluded.payload,
           feature_completeness = excluded.feature_completeness,
           updated_at = excluded.updated_at",
    )
    .map_err(sqe)?
    .execute(params![
        vector.case_id.to_string(),
        payload,
        vector.feature_completeness,
        vector.updated_at.to_rfc3339(),
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Fetch the feature vector for a case, if assembled
pub fn get(conn: &Connection, case_id: Uuid) -> Result<Option<BorrowerFeatureVector>> {
    let payload: Option<String> = conn
        .prepare_cached("SELECT payload FROM borrower_features WHERE case_id = ?1")
        .map_err(sqe)?
        .query_row(params![case_id.to_string()], |r| r.get(0))
        .optional()
        .map_err(sqe)?;
    match payload {
        Some(p) => serde_json::from_str(&p).map(Some).map_err(sqe),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;

    #[test]
    fn test_upsert_is_single_row() {
        let db = Database::open_in_memory().unwrap();
        let case_id = Uuid::new_v4();
        let mut v = BorrowerFeatureVector {
            case_id,
            cibil_score: Some(700),
            updated_at: Utc::now(),
            ..Default::default()
        };
        v.recompute_completeness();
        db.with_conn(|c| upsert(c, &v)).unwrap();
        v.cibil_score = Some(720);
        v.recompute_completeness();
        db.with_conn(|c| upsert(c, &v)).unwrap();

        let got = db.with_conn(|c| get(c, case_id)).unwrap().unwrap();
        assert_eq!(got.cibil_score, Some(720));
    }
}
