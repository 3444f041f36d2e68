//! Terminal rendering for run reports, case cards and the question registry.
//!
//! Cards follow one layout: a `=== title ===` banner, then sections of
//! `  label  value` rows, with empty sections skipped.

use curia_core::{CaseRecord, DiagnosticKind, FieldMap, FieldValue, RunReport, SchemaRegistry, Scope};

const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

/// Print the run summary after `curia build`.
pub fn print_report(report: &RunReport, cases: usize, holdings: usize) {
    println!("=== Run report ===");
    println!();

    println!("Files");
    println!("  {:<26} {}", "total", report.total_files);
    println!("  {:<26} {}", "successful", report.successful);
    println!("  {:<26} {}", "with warnings", report.successful_with_warnings);
    println!("  {:<26} {}", "failed", report.failed);
    println!();

    println!("Corpus");
    println!("  {:<26} {}", "cases", cases);
    println!("  {:<26} {}", "holdings", holdings);
    println!();

    let counts: Vec<(DiagnosticKind, usize)> = DiagnosticKind::ALL
        .iter()
        .map(|&kind| (kind, report.count(kind)))
        .filter(|&(_, n)| n > 0)
        .collect();
    if !counts.is_empty() {
        println!("Diagnostics");
        for (kind, n) in counts {
            let marker = if kind.is_fatal() { " (fatal)" } else { "" };
            println!("  {:<26} {}{}", kind.tag(), n, marker);
        }
        println!();
    }

    for (file, diagnostics) in &report.diagnostics_by_file {
        println!("{file}");
        for d in diagnostics {
            println!("  {d}");
        }
    }
}

/// Print one parsed case as a vertical card: case fields, each holding, diagnostics.
pub fn print_case_card(case: &CaseRecord, registry: &SchemaRegistry) {
    println!("=== {} ===", case.case_id);
    println!(
        "{} holding{}, {} diagnostic{}",
        case.holdings.len(),
        plural(case.holdings.len()),
        case.diagnostics.len(),
        plural(case.diagnostics.len())
    );
    println!();

    print_section("Case", &case.fields, registry);
    for holding in &case.holdings {
        let header = format!("Holding {}", holding.holding_index);
        if holding.fields.answered() == 0 {
            println!("{header}");
            println!("  (empty)");
            println!();
        } else {
            print_section(&header, &holding.fields, registry);
        }
    }

    if !case.diagnostics.is_empty() {
        println!("Diagnostics");
        for d in &case.diagnostics {
            println!("  {d}");
        }
        println!();
    }
}

/// Print the registry grouped by scope.
pub fn print_schema(registry: &SchemaRegistry) {
    for scope in [Scope::Case, Scope::Holding] {
        println!("{scope}");
        for entry in registry.entries(scope) {
            let required = if entry.required { "*" } else { " " };
            println!(
                "  {:<5}{} {:<22} {:<10} {}",
                entry.code,
                required,
                entry.label,
                entry.kind.name(),
                entry.question
            );
            if let curia_core::ValueKind::Enumerated(allowed) = entry.kind {
                println!("  {:<29} {}", "", allowed.join(" | "));
            }
        }
        println!();
    }
    println!("* required");
}

// ── Section rendering ──

fn print_section(header: &str, fields: &FieldMap, registry: &SchemaRegistry) {
    if fields.answered() == 0 {
        return;
    }

    println!("{header}");
    for (code, value) in fields.iter() {
        let Some(rendered) = format_value(value) else {
            continue;
        };
        let label = registry
            .lookup(fields.scope(), code)
            .map(|e| e.label)
            .unwrap_or(code);
        println!("  {:<26} {}", format!("{code} {label}"), rendered);
    }
    println!();
}

/// Human-readable form of a value; `None` for missing values.
fn format_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Missing => None,
        FieldValue::Text(s) | FieldValue::Category(s) => Some(s.clone()),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Boolean(b) => Some(if *b { "yes" } else { "no" }.to_string()),
        FieldValue::List(items) if items.is_empty() => Some("(none)".to_string()),
        FieldValue::List(items) => {
            let shown = items.iter().take(MAX_LIST_ITEMS).cloned().collect::<Vec<_>>().join(", ");
            if items.len() > MAX_LIST_ITEMS {
                Some(format!("{shown} ... and {} more", items.len() - MAX_LIST_ITEMS))
            } else {
                Some(shown)
            }
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
