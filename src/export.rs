//! Report export in CSV and PDF.
//!
//! Both formats carry the five headline KPIs of an overview. The PDF writer
//! emits a minimal single-page PDF 1.4 document using the built-in Helvetica
//! font, which every viewer ships, so no font embedding is needed.

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::model::KpiMetrics;
use crate::window::TimeWindow;

/// Title printed at the top of PDF reports.
pub const REPORT_TITLE: &str = "AI Helpdesk Analytics Report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "analytics_report.csv",
            ExportFormat::Pdf => "analytics_report.pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    /// Case-insensitive `csv` or `pdf`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(ValidationError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A rendered report ready to be sent as a download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

pub fn render(format: ExportFormat, metrics: &KpiMetrics, window: &TimeWindow) -> ExportDocument {
    let bytes = match format {
        ExportFormat::Csv => render_csv(metrics).into_bytes(),
        ExportFormat::Pdf => render_pdf(metrics, window),
    };
    ExportDocument { format, bytes }
}

/// Header row of KPI names, then one row of values.
pub fn render_csv(metrics: &KpiMetrics) -> String {
    let values: Vec<String> = kpi_values(metrics).into_iter().map(|(_, v)| v).collect();

    let mut out = KpiMetrics::COMPARED.join(",");
    out.push('\n');
    out.push_str(&values.join(","));
    out.push('\n');
    out
}

/// Render a single-page PDF listing the period and each KPI.
pub fn render_pdf(metrics: &KpiMetrics, window: &TimeWindow) -> Vec<u8> {
    let mut lines = vec![
        (18, REPORT_TITLE.to_string()),
        (
            12,
            format!("Period: {} to {}", window.start_iso(), window.end_iso()),
        ),
    ];
    for (name, value) in kpi_values(metrics) {
        lines.push((12, format!("{}: {}", title_case(name), value)));
    }

    let mut content = String::new();
    let mut y = 720;
    for (size, text) in &lines {
        let _ = writeln!(
            content,
            "BT /F1 {size} Tf 72 {y} Td ({}) Tj ET",
            escape_pdf_text(text)
        );
        y -= if *size > 12 { 36 } else { 20 };
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        let _ = write!(pdf, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }

    let xref_at = pdf.len();
    let _ = write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(pdf, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );

    pdf.into_bytes()
}

fn kpi_values(metrics: &KpiMetrics) -> Vec<(&'static str, String)> {
    vec![
        ("total_interactions", metrics.total_interactions.to_string()),
        ("unique_users", metrics.unique_users.to_string()),
        ("avg_session_duration", metrics.avg_session_duration.to_string()),
        ("completion_rate", metrics.completion_rate.to_string()),
        ("satisfaction_score", metrics.satisfaction_score.to_string()),
    ]
}

/// `avg_session_duration` -> `Avg Session Duration`.
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            // Helvetica in the standard encoding covers printable ASCII only.
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}
