//! End-to-end run: collect sources, extract, write snippets, analyze, remap.
//!
//! All per-run state lives in a [`RunContext`], so independent runs can
//! coexist in one process as long as they use different output directories.

use crate::analyzer::AnalyzerInvoker;
use crate::config::HarvestConfig;
use crate::extract::{ExtractorRegistry, registry_with_sql_methods};
use crate::provenance::ProvenanceMap;
use crate::remap::{ConsolidatedReport, ExtractionMetadata, FindingRemapper};
use crate::snippet::SnippetWriter;
use crate::{Error, Result};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Raw analyzer output, as extracted from its stdout
pub const RAW_REPORT_FILE: &str = "report.json";

/// Consolidated report with remapped findings
pub const FINAL_REPORT_FILE: &str = "final_report.json";

/// Mutable state of one run
pub struct RunContext {
    writer: SnippetWriter,
    sources_scanned: usize,
    warnings: Vec<String>,
}

impl RunContext {
    /// Open the output directory, purging snippets from earlier runs
    pub fn begin(output_dir: &Path) -> Result<Self> {
        Ok(Self {
            writer: SnippetWriter::begin(output_dir)?,
            sources_scanned: 0,
            warnings: Vec::new(),
        })
    }

    /// Record a recoverable per-file problem
    pub fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    /// Extract one source file and write a snippet per unit
    pub fn process_file(&mut self, registry: &ExtractorRegistry, path: &Path) -> Result<()> {
        self.sources_scanned += 1;

        let units = match registry.extract_file(path) {
            Ok(Some(units)) => units,
            Ok(None) => {
                tracing::debug!("No extractor for {}", path.display());
                return Ok(());
            }
            Err(e @ (Error::Io(_) | Error::Decode { .. })) => {
                self.warn(format!("Skipping {}: {}", path.display(), e));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("{}: {} unit(s)", path.display(), units.len());
        for unit in &units {
            self.writer.write(unit)?;
        }
        Ok(())
    }

    /// Persist the provenance record and close the extraction stage
    pub fn finish(self) -> Result<ExtractionRun> {
        let output_dir = self.writer.output_dir().to_path_buf();
        let snippet_count = self.writer.snippet_count();
        let provenance = self.writer.finish()?;
        Ok(ExtractionRun {
            metadata: ExtractionMetadata {
                snippet_count,
                sources_scanned: self.sources_scanned,
                output_dir: output_dir.display().to_string(),
                warnings: self.warnings,
            },
            output_dir,
            provenance,
        })
    }
}

/// Result of the extraction stage
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub output_dir: PathBuf,
    pub provenance: ProvenanceMap,
    pub metadata: ExtractionMetadata,
}

impl ExtractionRun {
    pub fn snippet_count(&self) -> usize {
        self.metadata.snippet_count
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.snippet_count == 0
    }
}

/// Brief summary of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub snippets: usize,
    pub files_scanned: usize,
    pub findings: usize,
    /// Path of the consolidated report
    pub report: String,
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// No SQL was found; the analyzer was not run
    NothingToAnalyze(ExtractionRun),
    Completed {
        report: ConsolidatedReport,
        summary: RunSummary,
    },
}

pub struct Pipeline {
    config: HarvestConfig,
    registry: ExtractorRegistry,
}

impl Pipeline {
    pub fn from_config(config: HarvestConfig) -> Self {
        let registry = registry_with_sql_methods(&config.java.sql_methods);
        Self { config, registry }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Files eligible for extraction, in a stable order
    pub fn collect_sources(&self, ctx: &mut RunContext) -> Vec<PathBuf> {
        let extensions = self.config.normalized_extensions();
        let eligible = |path: &Path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        };

        let mut sources = Vec::new();
        for target in &self.config.targets {
            if target.is_file() {
                sources.push(target.clone());
                continue;
            }
            if !target.is_dir() {
                ctx.warn(format!("Target {} does not exist", target.display()));
                continue;
            }

            let walker = WalkBuilder::new(target)
                .standard_filters(self.config.respect_ignore_files)
                .hidden(false)
                .sort_by_file_name(|a, b| a.cmp(b))
                .build();
            for entry in walker {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if entry.file_type().is_some_and(|t| t.is_file()) && eligible(path) {
                            sources.push(path.to_path_buf());
                        }
                    }
                    Err(e) => ctx.warn(format!("Cannot walk {}: {}", target.display(), e)),
                }
            }
        }
        sources
    }

    /// Extraction stage on its own: snippets plus `mapping.json`
    pub fn extract(&self) -> Result<ExtractionRun> {
        let mut ctx = RunContext::begin(&self.config.output_dir)?;
        let sources = self.collect_sources(&mut ctx);
        tracing::info!("Scanning {} source file(s)", sources.len());

        for path in &sources {
            ctx.process_file(&self.registry, path)?;
        }

        let run = ctx.finish()?;
        tracing::info!(
            "Extracted {} snippet(s) into {}",
            run.snippet_count(),
            run.output_dir.display()
        );
        Ok(run)
    }

    /// Rules reference handed to the analyzer
    pub fn rules(&self) -> Result<&str> {
        self.config
            .rules
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| Error::Config("no analyzer rules configured (set `rules` or pass --rules)".to_string()))
    }

    /// Run the analyzer over an extraction and remap its findings
    pub fn analyze(&self, extraction: ExtractionRun) -> Result<RunOutcome> {
        let rules = self.rules()?;
        remove_stale_reports(&extraction.output_dir)?;
        if extraction.is_empty() {
            tracing::info!("No SQL found, nothing to analyze");
            return Ok(RunOutcome::NothingToAnalyze(extraction));
        }

        let invoker = AnalyzerInvoker::from_config(&self.config.analyzer);
        let run = invoker.run(rules, &extraction.output_dir)?;
        std::fs::write(extraction.output_dir.join(RAW_REPORT_FILE), &run.raw_text)?;

        let base_dir = std::env::current_dir()?;
        let remapper = FindingRemapper::new(&extraction.provenance, base_dir);
        let report = remapper.remap(run.report, extraction.metadata.clone());

        let report_path = extraction.output_dir.join(FINAL_REPORT_FILE);
        report.save(&report_path)?;

        let summary = RunSummary {
            snippets: extraction.snippet_count(),
            files_scanned: extraction.metadata.sources_scanned,
            findings: report.findings.len(),
            report: report_path.display().to_string(),
        };
        Ok(RunOutcome::Completed { report, summary })
    }

    /// Full run: extraction then analysis
    pub fn run(&self) -> Result<RunOutcome> {
        self.rules()?;
        let extraction = self.extract()?;
        self.analyze(extraction)
    }
}

/// Delete reports left by an earlier run so they never sit next to a newer mapping
fn remove_stale_reports(output_dir: &Path) -> Result<()> {
    for name in [RAW_REPORT_FILE, FINAL_REPORT_FILE] {
        match std::fs::remove_file(output_dir.join(name)) {
            Ok(()) => tracing::debug!("Removed stale {}", name),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::MAPPING_FILE;
    use pretty_assertions::assert_eq;

    const DAO: &str = r#"package app;

class UserDao {
    User find(Connection c, String name) throws SQLException {
        PreparedStatement ps = c.prepareStatement("SELECT * FROM users " +
            "WHERE name = '" + name + "'");
        return map(ps.executeQuery());
    }
}
"#;

    const PLAIN: &str = "package app;\n\nclass Plain {\n    int answer() { return 42; }\n}\n";

    const MAPPER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mapper namespace="app.OrderMapper">
  <select id="byId">
    SELECT * FROM orders WHERE status = 'OPEN'
  </select>
</mapper>
"#;

    fn config_for(src: &Path, out: &Path) -> HarvestConfig {
        HarvestConfig {
            targets: vec![src.to_path_buf()],
            output_dir: out.to_path_buf(),
            ..HarvestConfig::default()
        }
    }

    #[test]
    fn test_collect_sources_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("b.java"), PLAIN).unwrap();
        std::fs::write(src.join("a.XML"), MAPPER).unwrap();
        std::fs::write(src.join("notes.txt"), "SELECT 1").unwrap();
        std::fs::write(src.join("nested").join("c.java"), PLAIN).unwrap();

        let mut config = config_for(&src, &dir.path().join("out"));
        config.targets.push(dir.path().join("missing"));
        let pipeline = Pipeline::from_config(config);
        let mut ctx = RunContext::begin(&dir.path().join("out")).unwrap();

        let sources = pipeline.collect_sources(&mut ctx);
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.strip_prefix(&src).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("a.XML"), PathBuf::from("b.java"), PathBuf::from("nested/c.java")]
        );
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_extract_writes_snippets_and_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("OrderMapper.xml"), MAPPER).unwrap();

        let run = Pipeline::from_config(config_for(&src, &out)).extract().unwrap();

        assert_eq!(run.snippet_count(), 1);
        let snippet = out.join("extracted_00001.sql");
        let body = std::fs::read_to_string(&snippet).unwrap();
        assert!(body.ends_with("SELECT * FROM orders WHERE status = 'OPEN';\n"));

        let mapping = ProvenanceMap::load(&out.join(MAPPING_FILE)).unwrap();
        let entry = mapping.get(&snippet.display().to_string()).unwrap();
        assert_eq!(entry.context, "<select>");
        assert_eq!(entry.approx_start_line, 4);
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Broken.java"), [0x63, 0x6c, 0xff, 0xfe, 0x20]).unwrap();
        std::fs::write(src.join("UserDao.java"), DAO).unwrap();

        let run = Pipeline::from_config(config_for(&src, &out)).extract().unwrap();

        assert_eq!(run.snippet_count(), 1);
        assert_eq!(run.metadata.sources_scanned, 2);
        assert_eq!(run.metadata.warnings.len(), 1);
        assert!(run.metadata.warnings[0].contains("Broken.java"));
    }

    #[test]
    fn test_run_requires_rules() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::from_config(config_for(dir.path(), &dir.path().join("out")));
        assert!(matches!(pipeline.run(), Err(Error::Config(_))));
    }

    #[test]
    fn test_nothing_to_analyze() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("Plain.java"), PLAIN).unwrap();

        let mut config = config_for(&src, &out);
        config.rules = Some("rules.yaml".to_string());
        config.analyzer.program = PathBuf::from("/nonexistent/analyzer-binary");

        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join(RAW_REPORT_FILE), "{}").unwrap();
        std::fs::write(out.join(FINAL_REPORT_FILE), "{}").unwrap();

        match Pipeline::from_config(config).run().unwrap() {
            RunOutcome::NothingToAnalyze(run) => {
                assert_eq!(run.metadata.sources_scanned, 1);
                assert!(out.join(MAPPING_FILE).exists());
                assert!(!out.join(RAW_REPORT_FILE).exists());
                assert!(!out.join(FINAL_REPORT_FILE).exists());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[cfg(unix)]
    mod end_to_end {
        use super::*;
        use pretty_assertions::assert_eq;
        use crate::config::AnalyzerConfig;

        /// Reports one finding on the first snippet of the directory it is given
        const FAKE_ANALYZER: &str = r#"for last; do :; done
echo "INFO loading rules"
echo "WARN {slow} rule set"
printf '{"findings":[{"rule_id":"sql-concat","message":"concatenated query","severity":"warning","location":{"file":"%s/extracted_00001.sql","start_line":2,"end_line":2,"start_column":1,"end_column":40}}],"summary":{"total":1}}\n' "$last"
echo "INFO done"
"#;

        fn analyzed_config(dir: &Path, src: &Path, out: &Path) -> HarvestConfig {
            let script = dir.join("fake-analyzer.sh");
            std::fs::write(&script, FAKE_ANALYZER).unwrap();
            HarvestConfig {
                rules: Some("rules.yaml".to_string()),
                analyzer: AnalyzerConfig {
                    program: PathBuf::from("sh"),
                    args: vec![script.display().to_string()],
                    ..AnalyzerConfig::default()
                },
                ..config_for(src, out)
            }
        }

        #[test]
        fn test_finding_maps_back_to_java_source() {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            let out = dir.path().join("out");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::write(src.join("A_UserDao.java"), DAO).unwrap();
            std::fs::write(src.join("B_Plain.java"), PLAIN).unwrap();

            let pipeline = Pipeline::from_config(analyzed_config(dir.path(), &src, &out));
            let RunOutcome::Completed { report, summary } = pipeline.run().unwrap() else {
                panic!("expected a completed run");
            };

            assert_eq!(report.extraction_metadata.snippet_count, 1);
            assert_eq!(report.extraction_metadata.sources_scanned, 2);
            assert_eq!(report.findings.len(), 1);

            let finding = &report.findings[0];
            let snippet = out.join("extracted_00001.sql");
            assert_eq!(finding.extracted_from(), Some(snippet.display().to_string().as_str()));
            assert_eq!(finding.context(), Some("call"));

            let dao = src.join("A_UserDao.java").display().to_string();
            assert_eq!(
                finding.finding.as_value()["location"],
                serde_json::json!({
                    "file": dao,
                    "start_line": 5,
                    "end_line": 5,
                    "start_column": 1,
                    "end_column": 120
                })
            );

            assert_eq!(summary.findings, 1);
            assert_eq!(summary.files_scanned, 2);

            let raw = std::fs::read_to_string(out.join(RAW_REPORT_FILE)).unwrap();
            assert!(raw.starts_with(r#"{"findings":[{"rule_id":"sql-concat","message":"concatenated query""#));
            assert!(raw.ends_with(r#""summary":{"total":1}}"#));

            let persisted: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(out.join(FINAL_REPORT_FILE)).unwrap()).unwrap();
            assert_eq!(persisted["findings"][0]["location"]["file"], dao.as_str());
            assert_eq!(persisted["summary"]["total"], 1);
        }

        #[test]
        fn test_finding_maps_back_to_mapper() {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            let out = dir.path().join("out");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::write(src.join("OrderMapper.xml"), MAPPER).unwrap();

            let pipeline = Pipeline::from_config(analyzed_config(dir.path(), &src, &out));
            let RunOutcome::Completed { report, .. } = pipeline.run().unwrap() else {
                panic!("expected a completed run");
            };

            let finding = &report.findings[0];
            assert_eq!(finding.context(), Some("<select>"));
            assert_eq!(finding.normalized_sql(), Some("SELECT * FROM orders WHERE status = 'OPEN';"));
            assert_eq!(finding.finding.start_line(), Some(4));
        }

        #[test]
        fn test_rerun_discards_stale_snippets() {
            let dir = tempfile::tempdir().unwrap();
            let src = dir.path().join("src");
            let out = dir.path().join("out");
            std::fs::create_dir_all(&src).unwrap();
            std::fs::write(src.join("A_UserDao.java"), DAO).unwrap();
            std::fs::write(src.join("OrderMapper.xml"), MAPPER).unwrap();

            let config = analyzed_config(dir.path(), &src, &out);
            Pipeline::from_config(config.clone()).run().unwrap();
            assert!(out.join("extracted_00002.sql").exists());

            std::fs::remove_file(src.join("OrderMapper.xml")).unwrap();
            Pipeline::from_config(config).run().unwrap();

            assert!(out.join("extracted_00001.sql").exists());
            assert!(!out.join("extracted_00002.sql").exists());
            let mapping = ProvenanceMap::load(&out.join(MAPPING_FILE)).unwrap();
            assert_eq!(mapping.len(), 1);
        }
    }
}
