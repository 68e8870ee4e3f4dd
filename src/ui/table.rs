use crate::remap::ReportedFinding;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
pub struct FindingRow {
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Rule")]
    pub rule: String,
    #[tabled(rename = "Location")]
    pub location: String,
    #[tabled(rename = "Context")]
    pub context: String,
    #[tabled(rename = "Message")]
    pub message: String,
}

impl FindingRow {
    pub fn from_finding(reported: &ReportedFinding) -> Self {
        let finding = &reported.finding;
        let file = finding.location().and_then(|loc| loc.get("file")).and_then(|f| f.as_str());
        let location = match (file, finding.start_line()) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.to_string(),
            _ => "-".to_string(),
        };
        Self {
            severity: finding.severity().unwrap_or("-").to_string(),
            rule: finding.rule_id().unwrap_or("-").to_string(),
            location,
            context: reported.context().unwrap_or("-").to_string(),
            message: finding.message().unwrap_or_default().to_string(),
        }
    }
}

/// Findings table; empty string when there is nothing to show
pub fn findings_table(findings: &[ReportedFinding]) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let rows: Vec<FindingRow> = findings.iter().map(FindingRow::from_finding).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}
