//! Output formatting module for CLI display
//!
//! Handlers compute summaries; this module turns them into terminal text.

use colored::Colorize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::importers::{BatchOutcome, SkippedDocument};
use crate::mapping::generator::GenerateSummary;
use crate::mapping::review::ReviewSummary;
use crate::mapping::sanitizer::{SanitizeReport, MANUAL_REVIEW};

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Total")]
    total: usize,
}

fn count_table(rows: Vec<(&str, usize)>) -> String {
    let rows: Vec<CountRow> = rows
        .into_iter()
        .map(|(item, total)| CountRow {
            item: item.to_string(),
            total,
        })
        .collect();
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string()
}

pub fn format_batch_summary(outcome: &BatchOutcome) -> String {
    let mut out = count_table(vec![
        ("Documentos processados", outcome.processed),
        ("Documentos com falha", outcome.failed),
        ("Documentos ignorados", outcome.ignored),
        ("Operações extraídas", outcome.transactions.len()),
    ]);
    out.push('\n');
    out.push_str(&format_skipped(&outcome.skipped));
    if outcome.interrupted {
        out.push_str(&format!(
            "{} Interrupted: results cover only the documents finished before the stop\n",
            "⚠".yellow().bold()
        ));
    }
    out
}

pub fn format_skipped(skipped: &[SkippedDocument]) -> String {
    let mut out = String::new();
    for doc in skipped {
        out.push_str(&format!("{} {}: {}\n", "✗".red().bold(), doc.name, doc.reason.dimmed()));
    }
    out
}

pub fn format_generate_summary(summary: &GenerateSummary) -> String {
    count_table(vec![
        ("Descrições analisadas", summary.total),
        ("Já mapeadas", summary.existing),
        ("Encontradas na B3", summary.from_lookup),
        ("Geradas por heurística", summary.from_heuristic),
        ("Opções", summary.options),
        ("Sem mapeamento", summary.unmapped),
    ])
}

pub fn format_sanitize_report(report: &SanitizeReport) -> String {
    #[derive(Tabled)]
    struct IssueRow {
        #[tabled(rename = "Descrição")]
        description: String,
        #[tabled(rename = "Ticker Atual")]
        ticker: String,
        #[tabled(rename = "Sugestão")]
        suggestion: String,
    }

    if report.issues.is_empty() {
        return format!(
            "{} All {} mapping(s) look valid\n",
            "✓".green().bold(),
            report.checked
        );
    }

    let mut out = String::new();
    for (reason, issues) in &report.issues {
        out.push_str(&format!("\n{} ({})\n", reason.yellow().bold(), issues.len()));
        let rows: Vec<IssueRow> = issues
            .iter()
            .map(|issue| IssueRow {
                description: issue.description.clone(),
                ticker: issue.ticker.clone(),
                suggestion: issue.suggestion.clone().unwrap_or_else(|| MANUAL_REVIEW.to_string()),
            })
            .collect();
        out.push_str(&Table::new(rows).with(Style::rounded()).to_string());
        out.push('\n');
    }
    out.push_str(&format!(
        "\n{} of {} mapping(s) need attention\n",
        report.issue_count(),
        report.checked
    ));
    out
}

pub fn format_review_summary(summary: &ReviewSummary) -> String {
    let mut out = count_table(vec![
        ("Importadas", summary.imported),
        ("Já existentes", summary.skipped),
        ("Pendentes", summary.pending),
    ]);
    out.push('\n');
    for (description, existing, reviewed) in &summary.conflicts {
        out.push_str(&format!(
            "{} {}: kept {} (reviewed {})\n",
            "⚠".yellow().bold(),
            description,
            existing,
            reviewed
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::sanitizer::Issue;

    #[test]
    fn batch_summary_lists_counts_and_skips() {
        colored::control::set_override(false);
        let outcome = BatchOutcome {
            processed: 2,
            failed: 1,
            skipped: vec![SkippedDocument {
                name: "quebrado.pdf".to_string(),
                reason: "not a PDF".to_string(),
            }],
            interrupted: true,
            ..BatchOutcome::default()
        };
        let text = format_batch_summary(&outcome);
        assert!(text.contains("Documentos processados"));
        assert!(text.contains("quebrado.pdf: not a PDF"));
        assert!(text.contains("Interrupted"));
    }

    #[test]
    fn sanitize_report_groups_by_reason() {
        colored::control::set_override(false);
        let mut report = SanitizeReport {
            checked: 3,
            ..SanitizeReport::default()
        };
        report.issues.insert(
            "PN deve terminar em 4".to_string(),
            vec![Issue {
                description: "ITAUSA PN N1".to_string(),
                ticker: "ITSA3".to_string(),
                suggestion: Some("ITSA4".to_string()),
            }],
        );
        let text = format_sanitize_report(&report);
        assert!(text.contains("PN deve terminar em 4 (1)"));
        assert!(text.contains("ITSA4"));
        assert!(text.contains("1 of 3"));
    }
}
