use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::application::script::ScriptReport;
use crate::domain::instance::InstanceOverview;
use crate::domain::replication::{CopyOutcome, CopyReport};
use crate::domain::value_objects::{DatabaseName, TableName};

#[derive(Tabled)]
struct FleetRow {
    instance: String,
    state: String,
    port: String,
    databases: String,
}

#[derive(Tabled)]
struct SummaryRow {
    metric: String,
    value: String,
}

pub fn print_fleet(overview: &[InstanceOverview]) {
    println!();
    println!("{}", "DATABASE INSTANCES".bold().cyan());
    println!();

    if overview.is_empty() {
        println!("{}", "No instances found.".italic());
        return;
    }

    let rows: Vec<FleetRow> = overview
        .iter()
        .map(|o| FleetRow {
            instance: o.name.as_str().bold().to_string(),
            state: state_label(o),
            port: o
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".dimmed().to_string()),
            databases: o
                .databases
                .iter()
                .map(|d| d.0.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!();
}

fn state_label(overview: &InstanceOverview) -> String {
    if overview.state.is_running() {
        overview.state.to_string().green().to_string()
    } else {
        overview.state.to_string().dimmed().to_string()
    }
}

// ─── Copy summary ─────────────────────────────────────────────────────────────

pub fn print_copy_summary(report: &CopyReport) {
    println!();
    println!("{}", "TABLE COPY SUMMARY".bold().cyan());
    println!(
        "{}/{} → {}/{}",
        report.source_instance.blue(),
        report.source_database.blue(),
        report.destination_instance.green(),
        report.destination_database.green()
    );
    println!("Operation: {}", report.operation_id.bright_yellow());
    println!();

    let rows = vec![
        SummaryRow {
            metric: "Table".into(),
            value: report.table.bold().to_string(),
        },
        SummaryRow {
            metric: "Outcome".into(),
            value: outcome_label(report.outcome),
        },
        SummaryRow {
            metric: "Columns".into(),
            value: report.columns.len().to_string(),
        },
        SummaryRow {
            metric: "Rows copied".into(),
            value: report.rows_copied.to_string().bold().to_string(),
        },
        SummaryRow {
            metric: "Fingerprint".into(),
            value: short_fingerprint(report.fingerprint.as_str())
                .dimmed()
                .to_string(),
        },
        SummaryRow {
            metric: "Duration".into(),
            value: format_duration(report.duration_ms),
        },
    ];

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=1)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!();
}

fn outcome_label(outcome: CopyOutcome) -> String {
    match outcome {
        CopyOutcome::Created => outcome.to_string().green().to_string(),
        CopyOutcome::Appended => outcome.to_string().yellow().to_string(),
        CopyOutcome::SchemaOnlyCopy => outcome.to_string().cyan().to_string(),
    }
}

/// First 12 hex chars are enough to eyeball two runs side by side.
fn short_fingerprint(hex: &str) -> String {
    if hex.len() <= 12 {
        hex.to_string()
    } else {
        format!("{}…", &hex[..12])
    }
}

// ─── Script summary ───────────────────────────────────────────────────────────

pub fn print_script_summary(report: &ScriptReport) {
    let total: u64 = report.rows_affected.iter().sum();
    println!(
        "{} {} statement(s) executed  ·  {} row(s) affected",
        "✓".green(),
        report.statements.to_string().bold(),
        total.to_string().bold()
    );
}

// ─── Instance listings ────────────────────────────────────────────────────────

pub fn print_databases(instance: &str, databases: &[DatabaseName]) {
    println!();
    println!("{} on {}", "DATABASES".bold().cyan(), instance.bold());
    if databases.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for db in databases {
        println!("  {}", db.0);
    }
    println!();
}

pub fn print_tables(instance: &str, database: &DatabaseName, tables: &[TableName]) {
    println!();
    println!(
        "{} in {} on {}",
        "TABLES".bold().cyan(),
        database.0.bold(),
        instance.bold()
    );
    if tables.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for table in tables {
        println!("  {}", table.0);
    }
    println!();
}

fn format_duration(ms: u64) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        format!("{ms}ms").yellow().to_string()
    } else {
        format!("{ms}ms").green().to_string()
    }
}
