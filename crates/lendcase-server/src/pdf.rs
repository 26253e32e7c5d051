//! Report PDF renderer
//!
//! Renders `CaseReportData` into a fixed-order A4 document: cover, borrower
//! snapshot, checklist, strengths/risks, lender match table, strategy,
//! advisory.

use std::io::BufWriter;

use lendcase_core::error::{CaseError, Result};
use lendcase_core::model::CaseReportData;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 18.0;
const LINE_HEIGHT_MM: f32 = 6.5;

/// Streaming line writer that adds pages as text flows past the bottom margin
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageWriter<'a> {
    fn heading(&mut self, text: &str) {
        self.advance(LINE_HEIGHT_MM * 1.5);
        self.layer
            .use_text(text, 13.0, Mm(MARGIN_MM), Mm(self.y), self.bold);
        self.advance(LINE_HEIGHT_MM);
    }

    fn line(&mut self, text: &str) {
        self.layer
            .use_text(text, 10.0, Mm(MARGIN_MM), Mm(self.y), self.regular);
        self.advance(LINE_HEIGHT_MM);
    }

    fn bullet(&mut self, text: &str) {
        self.line(&format!("• {text}"));
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
        if self.y < MARGIN_MM {
            let (page, layer) =
                self.doc
                    .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }
}

fn fmt_lakh(v: f64) -> String {
    format!("₹{:.1}L", v / 100_000.0)
}

fn fmt_opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "—".to_string(),
    }
}

/// Render the report into PDF bytes
pub fn render(data: &CaseReportData) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Lender Match Report {}", data.case_id),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "content",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| CaseError::internal(format!("pdf font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| CaseError::internal(format!("pdf font: {e}")))?;

    let mut w = PageWriter {
        doc: &doc,
        regular: &regular,
        bold: &bold,
        layer: doc.get_page(page).get_layer(layer),
        y: PAGE_HEIGHT_MM - MARGIN_MM,
    };

    // Cover
    w.layer
        .use_text("Lender Match Report", 20.0, Mm(MARGIN_MM), Mm(w.y), &bold);
    w.advance(LINE_HEIGHT_MM * 2.0);
    w.line(&format!("Case {} — {}", data.case_id, data.borrower.borrower_name));
    w.line(&format!(
        "{} of {} lenders matched",
        data.lenders_passed, data.lenders_evaluated
    ));

    // Borrower snapshot
    w.heading("Borrower");
    w.line(&format!("Entity: {}", fmt_opt(&data.borrower.entity_type)));
    w.line(&format!("GSTIN: {}", fmt_opt(&data.borrower.gstin)));
    w.line(&format!("Pincode: {}", fmt_opt(&data.borrower.pincode)));
    w.line(&format!(
        "Vintage: {}",
        data.borrower
            .business_vintage_years
            .map(|v| format!("{v:.1} years"))
            .unwrap_or_else(|| "—".into())
    ));
    w.line(&format!("CIBIL: {}", fmt_opt(&data.borrower.cibil_score)));
    w.line(&format!(
        "Annual turnover: {}",
        data.borrower.annual_turnover.map(fmt_lakh).unwrap_or_else(|| "—".into())
    ));
    w.line(&format!(
        "Average bank balance: {}",
        data.borrower.avg_monthly_balance.map(fmt_lakh).unwrap_or_else(|| "—".into())
    ));
    w.line(&format!(
        "Data completeness: {:.0}%",
        data.borrower.feature_completeness
    ));

    // Checklist
    w.heading("Document checklist");
    for d in &data.checklist.present {
        w.bullet(&format!("{} — on file", d.display_name()));
    }
    for d in &data.checklist.missing {
        w.bullet(&format!("{} — missing", d.display_name()));
    }
    for f in &data.checklist.unreadable {
        w.bullet(&format!("{f} — unreadable"));
    }

    // Strengths and risks
    w.heading("Strengths");
    if data.strengths.is_empty() {
        w.line("None recorded");
    }
    for s in &data.strengths {
        w.bullet(s);
    }
    w.heading("Risk flags");
    if data.risk_flags.is_empty() {
        w.line("None recorded");
    }
    for r in &data.risk_flags {
        w.bullet(r);
    }

    // Lender matches
    w.heading("Lender matches");
    if data.top_matches.is_empty() {
        w.line("No lender cleared hard filters");
    }
    for m in &data.top_matches {
        let ticket = match (m.expected_ticket_min, m.expected_ticket_max) {
            (Some(lo), Some(hi)) => format!("{}–{}", fmt_lakh(lo), fmt_lakh(hi)),
            _ => "—".into(),
        };
        w.line(&format!(
            "#{} {} — {}  score {:.0}  {}  ticket {}",
            m.rank,
            m.lender_name,
            m.product_name,
            m.eligibility_score,
            m.approval_probability.as_str(),
            ticket
        ));
    }

    // Strategy
    w.heading("Submission strategy");
    for (i, s) in data.strategy.iter().enumerate() {
        w.line(&format!("{}. {s}", i + 1));
    }

    // Advisory
    w.heading("Advisory");
    if data.advisory.is_empty() {
        w.line("Nothing outstanding");
    }
    for a in &data.advisory {
        w.bullet(a);
    }

    let mut bytes = Vec::new();
    doc.save(&mut BufWriter::new(&mut bytes))
        .map_err(|e| CaseError::internal(format!("pdf save: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendcase_core::model::{BorrowerSnapshot, DocumentChecklist};

    #[test]
    fn test_render_produces_pdf_bytes() {
        let data = CaseReportData {
            case_id: "CASE-20260101-0001".to_string(),
            borrower: BorrowerSnapshot {
                borrower_name: "Ravi Kumar".to_string(),
                entity_type: Some("PROPRIETORSHIP".to_string()),
                gstin: None,
                pincode: Some("400001".to_string()),
                business_vintage_years: Some(4.0),
                cibil_score: Some(741),
                annual_turnover: Some(8_000_000.0),
                avg_monthly_balance: Some(90_000.0),
                feature_completeness: 74.0,
            },
            checklist: DocumentChecklist {
                present: vec![],
                missing: vec![],
                unreadable: vec![],
                completeness_score: 0.0,
            },
            strengths: vec!["Healthy CIBIL score of 741".to_string()],
            risk_flags: vec![],
            top_matches: vec![],
            strategy: vec!["File with Axis".to_string()],
            advisory: vec![],
            expected_loan_min: None,
            expected_loan_max: None,
            lenders_evaluated: 10,
            lenders_passed: 0,
        };
        let bytes = render(&data).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }
}
