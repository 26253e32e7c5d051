//! lender_products and lender_pincodes reference tables
//!
//! Read-mostly reference data. Ingestion replaces rows inside one
//! transaction; the eligibility engine and copilot retrieval read from here.

use std::collections::{BTreeSet, HashMap, HashSet};

use lendcase_core::error::Result;
use lendcase_core::model::{DocumentType, EntityType, LenderProduct, ProgramType, QueryType};
use rusqlite::{params, Connection, Row};

use super::sqe;
use lendcase_core::copilot::QueryParams;

const SELECT_COLS: &str = "id, lender_name, product_name, program_type, is_active,
    policy_available, min_cibil_score, min_vintage_years, min_turnover_annual, min_abb,
    age_min, age_max, max_ticket_size, max_dpd_30plus, eligible_entity_types,
    required_documents, enforces_pincode";

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<LenderProduct> {
    let program: Option<String> = row.get(3)?;
    let entities: String = row.get(14)?;
    let docs: String = row.get(15)?;
    Ok(LenderProduct {
        id: row.get(0)?,
        lender_name: row.get(1)?,
        product_name: row.get(2)?,
        program_type: program.as_deref().and_then(ProgramType::parse),
        is_active: row.get::<_, i64>(4)? != 0,
        policy_available: row.get::<_, i64>(5)? != 0,
        min_cibil_score: row.get::<_, Option<i64>>(6)?.map(|n| n as u16),
        min_vintage_years: row.get(7)?,
        min_turnover_annual: row.get(8)?,
        min_abb: row.get(9)?,
        age_min: row.get::<_, Option<i64>>(10)?.map(|n| n as u32),
        age_max: row.get::<_, Option<i64>>(11)?.map(|n| n as u32),
        max_ticket_size: row.get(12)?,
        max_dpd_30plus: row.get::<_, Option<i64>>(13)?.map(|n| n as u32),
        eligible_entity_types: parse_set(&entities, EntityType::parse),
        required_documents: parse_set(&docs, DocumentType::parse),
        enforces_pincode: row.get::<_, i64>(16)? != 0,
    })
}

fn parse_set<T: Ord>(json: &str, parse: fn(&str) -> Option<T>) -> BTreeSet<T> {
    serde_json::from_str::<Vec<String>>(json)
        .unwrap_or_default()
        .iter()
        .filter_map(|s| parse(s))
        .collect()
}

/// Insert or update one product by (lender, product) key; returns its id
pub fn upsert(conn: &Connection, product: &LenderProduct) -> Result<i64> {
    let entities = serde_json::to_string(
        &product.eligible_entity_types.iter().map(|e| e.as_str()).collect::<Vec<_>>(),
    )
    .map_err(sqe)?;
    let docs = serde_json::to_string(
        &product.required_documents.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
    )
    .map_err(sqe)?;
    conn.prepare_cached(
        "INSERT INTO lender_products
         (lender_name, product_name, program_type, is_active, policy_available,
          min_cibil_score, min_vintage_years, min_turnover_annual, min_abb,
          age_min, age_max, max_ticket_size, max_dpd_30plus,
          eligible_entity_types, required_documents, enforces_pincode)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(lender_name, product_name) DO UPDATE SET
           program_type = excluded.program_type,
           is_active = excluded.is_active,
           policy_available = excluded.policy_available,
           min_cibil_score = excluded.min_cibil_score,
           min_vintage_years = excluded.min_vintage_years,
           min_turnover_annual = excluded.min_turnover_annual,
           min_abb = excluded.min_abb,
           age_min = excluded.age_min,
           age_max = excluded.age_max,
           max_ticket_size = excluded.max_ticket_size,
           max_dpd_30plus = excluded.max_dpd_30plus,
           eligible_entity_types = excluded.eligible_entity_types,
           required_documents = excluded.required_documents,
           enforces_pincode = excluded.enforces_pincode",
    )
    .map_err(sqe)?
    .execute(params![
        product.lender_name,
        product.product_name,
        product.program_type.map(|p| p.as_str()),
        product.is_active as i64,
        product.policy_available as i64,
        product.min_cibil_score.map(|n| n as i64),
        product.min_vintage_years,
        product.min_turnover_annual,
        product.min_abb,
        product.age_min.map(|n| n as i64),
        product.age_max.map(|n| n as i64),
        product.max_ticket_size,
        product.max_dpd_30plus.map(|n| n as i64),
        entities,
        docs,
        product.enforces_pincode as i64,
    ])
    .map_err(sqe)?;
    conn.query_row(
        "SELECT id FROM lender_products WHERE lender_name = ?1 AND product_name = ?2",
        params![product.lender_name, product.product_name],
        |r| r.get(0),
    )
    .map_err(sqe)
}

/// Replace the pincode list for one product
pub fn replace_pincodes(conn: &Connection, product_id: i64, pincodes: &[String]) -> Result<()> {
    conn.prepare_cached("DELETE FROM lender_pincodes WHERE lender_product_id = ?1")
        .map_err(sqe)?
        .execute(params![product_id])
        .map_err(sqe)?;
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO lender_pincodes (lender_product_id, pincode) VALUES (?1, ?2)",
        )
        .map_err(sqe)?;
    for p in pincodes {
        stmt.execute(params![product_id, p]).map_err(sqe)?;
    }
    Ok(())
}

/// All products, reference order
pub fn list_all(conn: &Connection) -> Result<Vec<LenderProduct>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM lender_products ORDER BY lender_name, product_name"
        ))
        .map_err(sqe)?;
    let rows = stmt.query_map([], row_to_product).map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Products eligible for evaluation: active with policy available
pub fn list_evaluable(conn: &Connection) -> Result<Vec<LenderProduct>> {
    let mut stmt = conn
        .prepare_cached(&format!(
            "SELECT {SELECT_COLS} FROM lender_products
             WHERE is_active = 1 AND policy_available = 1
             ORDER BY lender_name, product_name"
        ))
        .map_err(sqe)?;
    let rows = stmt.query_map([], row_to_product).map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Serviceable pincode sets per product id
pub fn pincode_map(conn: &Connection) -> Result<HashMap<i64, HashSet<String>>> {
    let mut stmt = conn
        .prepare_cached("SELECT lender_product_id, pincode FROM lender_pincodes")
        .map_err(sqe)?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))
        .map_err(sqe)?;
    let mut map: HashMap<i64, HashSet<String>> = HashMap::new();
    for row in rows {
        let (id, pincode) = row.map_err(sqe)?;
        map.entry(id).or_default().insert(pincode);
    }
    Ok(map)
}

/// Distinct lender names, for copilot query classification
pub fn lender_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare_cached("SELECT DISTINCT lender_name FROM lender_products ORDER BY lender_name")
        .map_err(sqe)?;
    let rows = stmt.query_map([], |r| r.get(0)).map_err(sqe)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(sqe)
}

/// Copilot retrieval: parameterized selection over the lender tables.
///
/// Returns JSON rows; no row limit is imposed. KNOWLEDGE queries never reach
/// this function.
pub fn retrieve_for_query(
    conn: &Connection,
    query_type: QueryType,
    params_in: &QueryParams,
) -> Result<serde_json::Value> {
    let products = match query_type {
        QueryType::Cibil => {
            let score = params_in.cibil_score.unwrap_or(900);
            list_evaluable(conn)?
                .into_iter()
                .filter(|p| p.min_cibil_score.map_or(true, |m| (m as i64) <= score))
                .collect()
        }
        QueryType::Pincode => match &params_in.pincode {
            Some(pin) => {
                let map = pincode_map(conn)?;
                list_evaluable(conn)?
                    .into_iter()
                    .filter(|p| {
                        !p.enforces_pincode
                            || map.get(&p.id).map_or(false, |set| set.contains(pin))
                    })
                    .collect()
            }
            None => list_evaluable(conn)?,
        },
        QueryType::LenderSpecific => match &params_in.lender_name {
            Some(name) => list_all(conn)?
                .into_iter()
                .filter(|p| p.lender_name.eq_ignore_ascii_case(name))
                .collect(),
            None => Vec::new(),
        },
        QueryType::Knowledge => Vec::new(),
        // Comparison, vintage, turnover, entity, ticket, requirement and
        // general questions all ground on the full evaluable table
        _ => list_evaluable(conn)?,
    };

    let rows: Vec<serde_json::Value> = products
        .iter()
        .map(|p| {
            serde_json::json!({
                "lender_name": p.lender_name,
                "product_name": p.product_name,
                "program_type": p.program_type.map(|t| t.as_str()),
                "min_cibil_score": p.min_cibil_score,
                "min_vintage_years": p.min_vintage_years,
                "min_turnover_annual": p.min_turnover_annual,
                "min_abb": p.min_abb,
                "age_min": p.age_min,
                "age_max": p.age_max,
                "max_ticket_size": p.max_ticket_size,
                "eligible_entity_types": p.eligible_entity_types.iter().map(|e| e.as_str()).collect::<Vec<_>>(),
                "required_documents": p.required_documents.iter().map(|d| d.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(serde_json::Value::Array(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn product(lender: &str, min_cibil: u16) -> LenderProduct {
        LenderProduct {
            id: 0,
            lender_name: lender.to_string(),
            product_name: "Business Loan".to_string(),
            program_type: None,
            is_active: true,
            policy_available: true,
            min_cibil_score: Some(min_cibil),
            min_vintage_years: Some(2.0),
            min_turnover_annual: Some(5_000_000.0),
            min_abb: None,
            age_min: None,
            age_max: None,
            max_ticket_size: Some(3_000_000.0),
            max_dpd_30plus: None,
            eligible_entity_types: BTreeSet::new(),
            required_documents: BTreeSet::new(),
            enforces_pincode: false,
        }
    }

    #[test]
    fn test_upsert_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let id = db.with_conn(|c| upsert(c, &product("Axis", 700))).unwrap();
        // Upsert again with a changed threshold keeps the same row
        let id2 = db.with_conn(|c| upsert(c, &product("Axis", 680))).unwrap();
        assert_eq!(id, id2);
        let all = db.with_conn(list_all).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].min_cibil_score, Some(680));
    }

    #[test]
    fn test_cibil_retrieval_filters_thresholds() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|c| upsert(c, &product("Axis", 700))).unwrap();
        db.with_conn(|c| upsert(c, &product("Kotak", 740))).unwrap();
        let params = QueryParams { cibil_score: Some(705), ..Default::default() };
        let rows = db
            .with_conn(|c| retrieve_for_query(c, QueryType::Cibil, &params))
            .unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["lender_name"], "Axis");
    }

    #[test]
    fn test_pincode_retrieval_joins_serviceability() {
        let db = Database::open_in_memory().unwrap();
        let mut geo = product("Axis", 700);
        geo.enforces_pincode = true;
        let id = db.with_conn(|c| upsert(c, &geo)).unwrap();
        db.with_conn(|c| replace_pincodes(c, id, &["400001".to_string()])).unwrap();
        db.with_conn(|c| upsert(c, &product("Kotak", 700))).unwrap();

        let params = QueryParams { pincode: Some("400001".to_string()), ..Default::default() };
        let rows = db
            .with_conn(|c| retrieve_for_query(c, QueryType::Pincode, &params))
            .unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);

        let params = QueryParams { pincode: Some("110001".to_string()), ..Default::default() };
        let rows = db
            .with_conn(|c| retrieve_for_query(c, QueryType::Pincode, &params))
            .unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["lender_name"], "Kotak");
    }
}
