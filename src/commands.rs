use owo_colors::OwoColorize;
use sqlharvest::config::{self, HarvestConfig};
use sqlharvest::output::{emit_success, OutputMode};
use sqlharvest::pipeline::{ExtractionRun, Pipeline, RunOutcome};
use sqlharvest::ui::{self, findings_table, section, severity_breakdown, stats_table, status, success, Icons, Spinner};
use std::path::Path;

fn report_extraction(run: &ExtractionRun) {
    status(Icons::FILE, "Sources scanned", &run.metadata.sources_scanned.to_string());
    status(Icons::PACKAGE, "Snippets", &run.snippet_count().to_string());
    status(Icons::LINK, "Output", &run.output_dir.display().to_string());
    for warning in &run.metadata.warnings {
        ui::warn(warning);
    }
}

pub fn run_analyze(config: HarvestConfig, output_mode: OutputMode) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config);
    pipeline.rules()?;

    if output_mode.is_human() {
        ui::header("Analyzing embedded SQL");
    }
    let extraction = pipeline.extract()?;
    if output_mode.is_human() {
        report_extraction(&extraction);
    }

    let spinner = (output_mode.is_human() && !extraction.is_empty()).then(|| Spinner::new("Running analyzer..."));
    let outcome = pipeline.analyze(extraction);
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    match outcome? {
        RunOutcome::NothingToAnalyze(run) => {
            if output_mode.is_human() {
                ui::info("Nothing to analyze", "no SQL found in the scanned sources");
            } else {
                let data = serde_json::json!({
                    "snippets": 0,
                    "files_scanned": run.metadata.sources_scanned,
                    "findings": 0,
                    "report": null,
                });
                emit_success(output_mode, "analyze", data)?;
            }
        }
        RunOutcome::Completed { report, summary } => {
            if output_mode.is_human() {
                if report.findings.is_empty() {
                    success("No findings");
                } else {
                    println!("{}", findings_table(&report.findings));
                    let severities: Vec<&str> = report.findings.iter().map(|f| f.finding.severity().unwrap_or_default()).collect();
                    severity_breakdown(&severities);
                }
                section("Summary");
                let snippets = summary.snippets.to_string();
                let files = summary.files_scanned.to_string();
                let findings = summary.findings.to_string();
                let resolved = report.resolved_count().to_string();
                println!(
                    "{}",
                    stats_table(&[
                        ("Files scanned", &files),
                        ("Snippets", &snippets),
                        ("Findings", &findings),
                        ("Mapped to source", &resolved),
                    ])
                );
                status(Icons::STATS, "Report", &summary.report);
            } else {
                emit_success(output_mode, "analyze", &summary)?;
            }
        }
    }
    Ok(())
}

pub fn run_extract(config: HarvestConfig, output_mode: OutputMode) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config);

    if output_mode.is_human() {
        ui::header("Extracting embedded SQL");
    }
    let run = pipeline.extract()?;

    if output_mode.is_human() {
        report_extraction(&run);
        if run.is_empty() {
            ui::info("Nothing to analyze", "no SQL found in the scanned sources");
        } else {
            success(&format!("Wrote {} snippet(s)", run.snippet_count()));
        }
    } else {
        let data = serde_json::json!({
            "snippets": run.snippet_count(),
            "files_scanned": run.metadata.sources_scanned,
            "output_dir": run.metadata.output_dir,
            "warnings": run.metadata.warnings,
        });
        emit_success(output_mode, "extract", data)?;
    }
    Ok(())
}

pub fn run_init(path: &Path, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    config::write_config(path, &HarvestConfig::default(), force)?;
    if output_mode.is_human() {
        success(&format!("Wrote default configuration to {}", path.display()));
    } else {
        let data = serde_json::json!({ "path": path.display().to_string() });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

pub fn run_version(output_mode: OutputMode) -> anyhow::Result<()> {
    if output_mode.is_human() {
        println!(
            "{} {}",
            "sqlharvest".bold().style(ui::theme().info.clone()),
            format!("Version {}", env!("CARGO_PKG_VERSION")).bold()
        );
    } else {
        let data = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        });
        emit_success(output_mode, "version", data)?;
    }
    Ok(())
}
