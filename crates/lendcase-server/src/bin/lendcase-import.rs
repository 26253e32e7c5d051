//! Lender reference data import tool
//!
//! Loads lender product policies and pincode serviceability from CSV into
//! the reference tables. Each file loads inside one transaction so readers
//! never observe a half-swapped table.
//!
//! Products CSV columns:
//!   lender_name, product_name, program_type, is_active, policy_available,
//!   min_cibil_score, min_vintage_years, min_turnover_annual, min_abb,
//!   age_min, age_max, max_ticket_size, max_dpd_30plus,
//!   eligible_entity_types (|-separated), required_documents (|-separated),
//!   enforces_pincode
//!
//! Pincodes CSV columns: lender_name, product_name, pincode
//!
//! Exit codes: 0 success, 1 validation error, 2 I/O error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lendcase_core::model::{DocumentType, EntityType, LenderProduct, ProgramType};
use lendcase_server::db::{lenders, Database};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Lendcase lender policy importer
#[derive(Parser, Debug)]
#[command(name = "lendcase-import")]
#[command(author, version, about, long_about = None)]
struct ImportConfig {
    /// SQLite database path
    #[arg(long, env = "LENDCASE_DB_PATH", default_value = "lendcase.db")]
    db_path: PathBuf,

    /// Lender products CSV
    #[arg(long)]
    products: Option<PathBuf>,

    /// Lender pincodes CSV
    #[arg(long)]
    pincodes: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ProductRow {
    lender_name: String,
    product_name: String,
    #[serde(default)]
    program_type: String,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default = "default_true")]
    policy_available: bool,
    min_cibil_score: Option<u16>,
    min_vintage_years: Option<f64>,
    min_turnover_annual: Option<f64>,
    min_abb: Option<f64>,
    age_min: Option<u32>,
    age_max: Option<u32>,
    max_ticket_size: Option<f64>,
    max_dpd_30plus: Option<u32>,
    #[serde(default)]
    eligible_entity_types: String,
    #[serde(default)]
    required_documents: String,
    #[serde(default)]
    enforces_pincode: bool,
}

#[derive(Debug, Deserialize)]
struct PincodeRow {
    lender_name: String,
    product_name: String,
    pincode: String,
}

fn default_true() -> bool {
    true
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = ImportConfig::parse();

    if config.products.is_none() && config.pincodes.is_none() {
        eprintln!("nothing to do: pass --products and/or --pincodes");
        return ExitCode::from(1);
    }

    let db = match Database::open(&config.db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("cannot open database: {e}");
            return ExitCode::from(2);
        }
    };

    if let Some(path) = &config.products {
        match import_products(&db, path) {
            Ok(count) => println!("loaded {count} lender products"),
            Err(ImportError::Validation(msg)) => {
                eprintln!("invalid products file: {msg}");
                return ExitCode::from(1);
            }
            Err(ImportError::Io(msg)) => {
                eprintln!("cannot read products file: {msg}");
                return ExitCode::from(2);
            }
        }
    }

    if let Some(path) = &config.pincodes {
        match import_pincodes(&db, path) {
            Ok(count) => println!("loaded {count} pincode mappings"),
            Err(ImportError::Validation(msg)) => {
                eprintln!("invalid pincodes file: {msg}");
                return ExitCode::from(1);
            }
            Err(ImportError::Io(msg)) => {
                eprintln!("cannot read pincodes file: {msg}");
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::SUCCESS
}

enum ImportError {
    Validation(String),
    Io(String),
}

fn import_products(db: &Database, path: &PathBuf) -> Result<usize, ImportError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ImportError::Io(e.to_string()))?;
    let mut products = Vec::new();
    for (line, row) in reader.deserialize::<ProductRow>().enumerate() {
        let row = row.map_err(|e| ImportError::Validation(format!("line {}: {e}", line + 2)))?;
        products.push(to_product(row, line + 2)?);
    }
    if products.is_empty() {
        return Err(ImportError::Validation("no product rows".to_string()));
    }

    let count = products.len();
    db.with_tx(|tx| {
        for p in &products {
            lenders::upsert(tx, p)?;
        }
        Ok(())
    })
    .map_err(|e| ImportError::Io(e.to_string()))?;
    Ok(count)
}

fn to_product(row: ProductRow, line: usize) -> Result<LenderProduct, ImportError> {
    if row.lender_name.trim().is_empty() || row.product_name.trim().is_empty() {
        return Err(ImportError::Validation(format!(
            "line {line}: lender_name and product_name are required"
        )));
    }
    let program_type = match row.program_type.trim() {
        "" => None,
        s => Some(ProgramType::parse(s).ok_or_else(|| {
            ImportError::Validation(format!("line {line}: unknown program_type '{s}'"))
        })?),
    };
    let eligible_entity_types = row
        .eligible_entity_types
        .split('|')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            EntityType::parse(s).ok_or_else(|| {
                ImportError::Validation(format!("line {line}: unknown entity type '{s}'"))
            })
        })
        .collect::<Result<_, _>>()?;
    let required_documents = row
        .required_documents
        .split('|')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            DocumentType::parse(s.trim()).ok_or_else(|| {
                ImportError::Validation(format!("line {line}: unknown document type '{s}'"))
            })
        })
        .collect::<Result<_, _>>()?;

    Ok(LenderProduct {
        id: 0,
        lender_name: row.lender_name.trim().to_string(),
        product_name: row.product_name.trim().to_string(),
        program_type,
        is_active: row.is_active,
        policy_available: row.policy_available,
        min_cibil_score: row.min_cibil_score,
        min_vintage_years: row.min_vintage_years,
        min_turnover_annual: row.min_turnover_annual,
        min_abb: row.min_abb,
        age_min: row.age_min,
        age_max: row.age_max,
        max_ticket_size: row.max_ticket_size,
        max_dpd_30plus: row.max_dpd_30plus,
        eligible_entity_types,
        required_documents,
        enforces_pincode: row.enforces_pincode,
    })
}

fn import_pincodes(db: &Database, path: &PathBuf) -> Result<usize, ImportError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ImportError::Io(e.to_string()))?;
    let mut by_product: HashMap<(String, String), Vec<String>> = HashMap::new();
    let mut count = 0;
    for (line, row) in reader.deserialize::<PincodeRow>().enumerate() {
        let row = row.map_err(|e| ImportError::Validation(format!("line {}: {e}", line + 2)))?;
        let pincode = row.pincode.trim().to_string();
        if pincode.len() != 6 || !pincode.chars().all(|c| c.is_ascii_digit()) {
            return Err(ImportError::Validation(format!(
                "line {}: '{pincode}' is not a 6-digit pincode",
                line + 2
            )));
        }
        by_product
            .entry((row.lender_name.trim().to_string(), row.product_name.trim().to_string()))
            .or_default()
            .push(pincode);
        count += 1;
    }

    db.with_tx(|tx| {
        let products = lenders::list_all(tx)?;
        for ((lender, product), pincodes) in &by_product {
            let found = products
                .iter()
                .find(|p| &p.lender_name == lender && &p.product_name == product)
                .ok_or_else(|| {
                    lendcase_core::error::CaseError::validation(format!(
                        "unknown product '{lender} / {product}' in pincode file"
                    ))
                })?;
            lenders::replace_pincodes(tx, found.id, pincodes)?;
        }
        Ok(())
    })
    .map_err(|e| match e {
        lendcase_core::error::CaseError::Validation { message } => ImportError::Validation(message),
        other => ImportError::Io(other.to_string()),
    })?;
    Ok(count)
}
