//! copilot_queries table queries

use lendcase_core::error::Result;
use lendcase_core::model::{CopilotQuery, QueryType};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::cases::parse_ts;
use super::sqe;

fn row_to_query(row: &Row<'_>) -> rusqlite::Result<CopilotQuery> {
    let id: String = row.get(0)?;
    let case_id: Option<String> = row.get(2)?;
    let detected: String = row.get(4)?;
    let sources: String = row.get(5)?;
    let created: String = row.get(7)?;
    Ok(CopilotQuery {
        id: id.parse().unwrap_or_default(),
        operator_id: row.get(1)?,
        case_id: case_id.and_then(|s| s.parse().ok()),
        query_text: row.get(3)?,
        detected_type: QueryType::parse(&detected).unwrap_or(QueryType::General),
        retrieved_sources: serde_json::from_str(&sources).unwrap_or(serde_json::Value::Null),
        response_text: row.get(6)?,
        created_at: parse_ts(&created),
    })
}

/// Persist one exchange
pub fn insert(conn: &Connection, q: &CopilotQuery) -> Result<()> {
    conn.prepare_cached(
        "INSERT INTO copilot_queries
         (id, operator_id, case_id, query_text, detected_type, retrieved_sources,
          response_text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .map_err(sqe)?
    .execute(params![
        q.id.to_string(),
        q.operator_id,
        q.case_id.map(|c| c.to_string()),
        q.query_text,
        q.detected_type.as_str(),
        q.retrieved_sources.to_string(),
        q.response_text,
        q.created_at.to_rfc3339(),
    ])
    .map_err(sqe)?;
    Ok(())
}

/// Recent exchanges for an operator, most recent first
pub fn history(conn: &Connection, operator_id: &str, limit: usize) -> Result<Vec<CopilotQuery>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, operator_id, case_id, query_text, detected_type, retrieved_sources,
                    response_text, created_at
             FROM copilot_queries WHERE operator_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )
        .map_err(sqe)?;
    let rows = stmt
        .query_map(params![operator_id, limit as i64], row_to_query)
        .map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Utc;

    #[test]
    fn test_history_order_and_limit() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..7 {
            let q = CopilotQuery {
                id: Uuid::new_v4(),
                operator_id: "op-1".to_string(),
                case_id: None,
                query_text: format!("q{i}"),
                detected_type: QueryType::General,
                retrieved_sources: serde_json::Value::Null,
                response_text: format!("a{i}"),
                created_at: Utc::now() + chrono::Duration::milliseconds(i),
            };
            db.with_conn(|c| insert(c, &q)).unwrap();
        }
        let recent = db.with_conn(|c| history(c, "op-1", 5)).unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].query_text, "q6");
        assert_eq!(recent[4].query_text, "q2");
    }
}
