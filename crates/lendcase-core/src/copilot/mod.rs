//! Copilot query understanding
//!
//! Rule-based query classification, the domain glossary, prompt composition
//! and the template fallback used when the LLM is unreachable. Retrieval SQL
//! lives with the data store.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{ChatMessage, QueryType};

/// Conversation pairs injected into the prompt
pub const MEMORY_WINDOW: usize = 5;

/// Glossary of domain terms: (canonical term, aliases, definition)
pub static GLOSSARY: Lazy<Vec<(&str, Vec<&str>, &str)>> = Lazy::new(|| {
    vec![
        (
            "FOIR",
            vec!["foir", "fixed obligation"],
            "FOIR (Fixed Obligation to Income Ratio) measures repayment load: \
             FOIR = total monthly EMIs / monthly income. Lenders typically cap \
             FOIR between 50% and 65%; a lower ratio leaves room for new EMIs.",
        ),
        (
            "ABB",
            vec!["abb", "average bank balance", "average balance"],
            "ABB (Average Bank Balance) is the mean closing balance across the \
             statement window. Lenders read it as liquidity headroom and set \
             product-specific minimums.",
        ),
        (
            "DPD",
            vec!["dpd", "days past due"],
            "DPD (Days Past Due) counts how late a repayment is. 30+, 60+ and \
             90+ DPD buckets on the bureau report weigh progressively harder \
             against approval.",
        ),
        (
            "CIBIL",
            vec!["cibil", "cibil score", "credit score"],
            "A CIBIL score is a 300-900 bureau score for an individual. Most \
             business lenders look for 680-700+; 750+ prices best.",
        ),
        (
            "GSTIN",
            vec!["gstin", "gst number"],
            "A GSTIN is the 15-character GST identification number. Characters \
             3-12 embed the holder's PAN, which is how certificates are \
             cross-checked against identity documents.",
        ),
        (
            "PAN",
            vec!["pan", "pan number"],
            "A PAN is the 10-character alphanumeric tax identifier. The fourth \
             character encodes the holder class (P individual, C company, F \
             firm, and so on).",
        ),
        (
            "vintage",
            vec!["vintage", "business vintage"],
            "Business vintage is the operating age of the business, measured \
             from registration. Most lenders want 2-3 years minimum.",
        ),
        (
            "ticket size",
            vec!["ticket", "ticket size", "loan amount"],
            "Ticket size is the sanctioned loan amount. Unsecured business \
             loans typically land between 10% and 25% of annual turnover, \
             capped by each product.",
        ),
        (
            "pincode serviceability",
            vec!["pincode", "pin code", "serviceability"],
            "Pincode serviceability is whether a lender operates in the \
             borrower's 6-digit postal code; geography-restricted products are \
             filtered on it outright.",
        ),
    ]
});

/// Parameters pulled out of the query for retrieval bindings
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryParams {
    pub cibil_score: Option<i64>,
    pub pincode: Option<String>,
    pub lender_name: Option<String>,
}

static SCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([3-8][0-9]{2}|900)\b").unwrap());
static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([1-9][0-9]{5})\b").unwrap());

/// Classify a query and extract retrieval parameters.
///
/// `known_lenders` drives LENDER_SPECIFIC detection; pass the distinct lender
/// names from the reference tables.
pub fn classify_query(text: &str, known_lenders: &[String]) -> (QueryType, QueryParams) {
    let lower = text.to_lowercase();
    let mut params = QueryParams::default();

    if let Some(c) = SCORE_RE.captures(&lower) {
        params.cibil_score = c[1].parse().ok();
    }
    if let Some(c) = PINCODE_RE.captures(&lower) {
        params.pincode = Some(c[1].to_string());
    }
    params.lender_name = known_lenders
        .iter()
        .find(|l| lower.contains(&l.to_lowercase()))
        .cloned();

    // Short glossary-shaped queries resolve to KNOWLEDGE before anything else
    if is_knowledge_query(&lower) {
        return (QueryType::Knowledge, params);
    }

    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let qt = if has(&["compare", " vs ", "versus", "better than", "which is better"]) {
        QueryType::Comparison
    } else if params.lender_name.is_some() {
        QueryType::LenderSpecific
    } else if has(&["cibil", "credit score", "bureau score"]) {
        QueryType::Cibil
    } else if has(&["pincode", "pin code", "serviceab"]) || params.pincode.is_some() {
        QueryType::Pincode
    } else if has(&["vintage", "years in business", "how old"]) {
        QueryType::Vintage
    } else if has(&["turnover", "revenue", "sales"]) {
        QueryType::Turnover
    } else if has(&["proprietorship", "partnership", "pvt", "private limited", "llp", "entity"]) {
        QueryType::Entity
    } else if has(&["ticket", "loan amount", "how much loan", "maximum loan"]) {
        QueryType::Ticket
    } else if has(&["document", "requirement", "docs", "checklist", "papers"]) {
        QueryType::Requirement
    } else {
        QueryType::General
    };
    (qt, params)
}

/// Two/three-word queries (optionally "what is …" shaped) matching a glossary
/// term are definitions, not retrievals
fn is_knowledge_query(lower: &str) -> bool {
    let stripped = lower
        .trim()
        .trim_start_matches("what is ")
        .trim_start_matches("what's ")
        .trim_start_matches("define ")
        .trim_start_matches("meaning of ")
        .trim_end_matches(['?', '.', '!'])
        .trim();
    if stripped.split_whitespace().count() > 3 {
        return false;
    }
    lookup_glossary(stripped).is_some()
}

/// Find the glossary entry a term refers to
pub fn lookup_glossary(term: &str) -> Option<&'static str> {
    let lower = term.trim().trim_end_matches(['?', '.', '!']).trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }
    GLOSSARY
        .iter()
        .find(|(_, aliases, _)| aliases.iter().any(|a| *a == lower))
        .map(|(_, _, def)| *def)
}

/// Glossary-backed answer for a KNOWLEDGE query, when the term is known
pub fn knowledge_answer(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    let stripped = lower
        .trim()
        .trim_start_matches("what is ")
        .trim_start_matches("what's ")
        .trim_start_matches("define ")
        .trim_start_matches("meaning of ")
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string();
    lookup_glossary(&stripped).map(|d| d.to_string())
}

/// Canned notice when the LLM is unreachable and the glossary has no answer
pub fn llm_unavailable_notice() -> String {
    "The assistant's language model is unavailable right now. Try a narrower \
     question such as \"lenders for CIBIL 705\", \"is 400001 serviceable\" or \
     \"what is FOIR\"."
        .to_string()
}

/// Fixed domain system prompt for the LLM
pub fn system_prompt() -> String {
    let mut s = String::from(
        "You are a loan-selection copilot for credit intermediaries in India. \
         Answer concisely from the lender data provided; never invent lender \
         policies. Domain glossary:\n",
    );
    for (term, _, def) in GLOSSARY.iter() {
        s.push_str(&format!("- {term}: {def}\n"));
    }
    s
}

/// Compose the chat messages for the LLM call: system prompt, conversation
/// memory (oldest first), then the user query with retrieved rows inlined
pub fn compose_prompt(
    history: &[(String, String)],
    retrieved: &serde_json::Value,
    query: &str,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt())];
    for (q, a) in history.iter().rev().take(MEMORY_WINDOW).rev() {
        messages.push(ChatMessage::user(q.clone()));
        messages.push(ChatMessage::assistant(a.clone()));
    }
    let user = match retrieved {
        serde_json::Value::Array(rows) if !rows.is_empty() => format!(
            "Lender data:\n{}\n\nQuestion: {query}",
            serde_json::to_string_pretty(retrieved).unwrap_or_default()
        ),
        _ => format!("Question: {query}"),
    };
    messages.push(ChatMessage::user(user));
    messages
}

/// Template answer rendered from retrieved rows when the LLM call fails
pub fn template_fallback(query_type: QueryType, rows: &serde_json::Value) -> String {
    let rows = match rows.as_array() {
        Some(rows) if !rows.is_empty() => rows,
        _ => {
            return match query_type {
                QueryType::Knowledge => llm_unavailable_notice(),
                _ => "No lender products matched that question.".to_string(),
            }
        }
    };

    let mut lines = vec![format!("{} matching products:", rows.len())];
    for row in rows.iter().take(10) {
        let lender = row.get("lender_name").and_then(|v| v.as_str()).unwrap_or("?");
        let product = row.get("product_name").and_then(|v| v.as_str()).unwrap_or("?");
        let mut line = format!("• {lender} — {product}");
        if let Some(c) = row.get("min_cibil_score").and_then(|v| v.as_i64()) {
            line.push_str(&format!(" (CIBIL {c}+"));
            if let Some(t) = row.get("min_turnover_annual").and_then(|v| v.as_f64()) {
                line.push_str(&format!(", turnover ₹{:.1}L+", t / 100_000.0));
            }
            line.push(')');
        }
        lines.push(line);
    }
    if rows.len() > 10 {
        lines.push(format!("…and {} more", rows.len() - 10));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knowledge_two_word_query() {
        let (qt, _) = classify_query("what is FOIR", &[]);
        assert_eq!(qt, QueryType::Knowledge);
        let answer = knowledge_answer("what is FOIR").unwrap();
        assert!(answer.contains("Fixed Obligation to Income Ratio"));
        assert!(answer.contains("monthly EMIs / monthly income"));
    }

    #[test]
    fn test_cibil_query_extracts_score() {
        let (qt, params) = classify_query("which lenders accept cibil 705?", &[]);
        assert_eq!(qt, QueryType::Cibil);
        assert_eq!(params.cibil_score, Some(705));
    }

    #[test]
    fn test_pincode_query() {
        let (qt, params) = classify_query("is 400001 serviceable?", &[]);
        assert_eq!(qt, QueryType::Pincode);
        assert_eq!(params.pincode.as_deref(), Some("400001"));
    }

    #[test]
    fn test_lender_specific_query() {
        let lenders = vec!["Axis Finance".to_string(), "Kotak".to_string()];
        let (qt, params) = classify_query("what is the policy of axis finance?", &lenders);
        assert_eq!(qt, QueryType::LenderSpecific);
        assert_eq!(params.lender_name.as_deref(), Some("Axis Finance"));
    }

    #[test]
    fn test_comparison_beats_lender_specific() {
        let lenders = vec!["Axis Finance".to_string()];
        let (qt, _) = classify_query("compare axis finance with others", &lenders);
        assert_eq!(qt, QueryType::Comparison);
    }

    #[test]
    fn test_general_fallback() {
        let (qt, _) = classify_query("help me with this case", &[]);
        assert_eq!(qt, QueryType::General);
    }

    #[test]
    fn test_prompt_includes_memory_window_only() {
        let history: Vec<(String, String)> = (0..8)
            .map(|i| (format!("q{i}"), format!("a{i}")))
            .collect();
        let messages = compose_prompt(&history, &serde_json::Value::Null, "next question");
        // 1 system + 5 pairs + 1 user
        assert_eq!(messages.len(), 1 + MEMORY_WINDOW * 2 + 1);
        assert_eq!(messages[1].content, "q3");
        assert!(messages.last().unwrap().content.contains("next question"));
    }

    #[test]
    fn test_template_fallback_lists_rows() {
        let rows = serde_json::json!([
            {"lender_name": "Axis", "product_name": "BL", "min_cibil_score": 700},
            {"lender_name": "Kotak", "product_name": "WC", "min_cibil_score": 680}
        ]);
        let text = template_fallback(QueryType::Cibil, &rows);
        assert!(text.contains("Axis — BL"));
        assert!(text.contains("CIBIL 680+"));
    }
}
