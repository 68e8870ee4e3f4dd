//! External analyzer invocation
//!
//! Runs `{program} {args..} [-q] analyze --language sql --config {rules} {dir}`
//! to completion and extracts the result object from its stdout. A binary
//! that rejects the quiet flag is retried once without it.

use super::result::{AnalyzerReport, extract_result};
use crate::config::AnalyzerConfig;
use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Parsed analyzer output plus the raw object it came from
#[derive(Debug, Clone)]
pub struct AnalyzerRun {
    /// The result object's text exactly as printed
    pub raw_text: String,
    /// The result object, parsed
    pub raw: Value,
    /// Typed view of `raw`
    pub report: AnalyzerReport,
}

/// Runs the external analyzer over a snippet directory
#[derive(Debug, Clone)]
pub struct AnalyzerInvoker {
    program: PathBuf,
    leading_args: Vec<String>,
    language: String,
    quiet_flag: Option<String>,
}

impl AnalyzerInvoker {
    /// Invoker for a bare analyzer binary with the default SQL language hint
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::from_config(&AnalyzerConfig {
            program: program.into(),
            ..AnalyzerConfig::default()
        })
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            program: config.program.clone(),
            leading_args: config.args.clone(),
            language: config.language.clone(),
            quiet_flag: config.quiet_flag.clone().filter(|f| !f.is_empty()),
        }
    }

    /// Arguments for one attempt
    pub fn arguments(&self, rules: &str, snippet_dir: &Path, quiet: bool) -> Vec<String> {
        let mut args = self.leading_args.clone();
        if quiet {
            if let Some(flag) = &self.quiet_flag {
                args.push(flag.clone());
            }
        }
        args.extend([
            "analyze".to_string(),
            "--language".to_string(),
            self.language.clone(),
            "--config".to_string(),
            rules.to_string(),
            snippet_dir.display().to_string(),
        ]);
        args
    }

    /// Run the analyzer and return its parsed result.
    pub fn run(&self, rules: &str, snippet_dir: &Path) -> Result<AnalyzerRun> {
        let mut output = self.execute(rules, snippet_dir, self.quiet_flag.is_some())?;

        if !output.status.success() {
            if let Some(flag) = &self.quiet_flag {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if rejects_flag(&stderr, flag) {
                    tracing::warn!("Analyzer does not support {}, retrying without it", flag);
                    output = self.execute(rules, snippet_dir, false)?;
                }
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(Error::AnalyzerFailed {
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }

        let Some(located) = extract_result(&stdout) else {
            return Err(Error::MalformedResult { stdout, stderr });
        };
        tracing::debug!("Analyzer result located via {:?}", located.tier);
        let report = AnalyzerReport::from_value(&located.value);
        tracing::info!("Analyzer reported {} finding(s)", report.findings.len());

        Ok(AnalyzerRun {
            raw_text: located.text.to_string(),
            raw: located.value,
            report,
        })
    }

    fn execute(&self, rules: &str, snippet_dir: &Path, quiet: bool) -> Result<Output> {
        let args = self.arguments(rules, snippet_dir, quiet);
        tracing::debug!("Running {} {}", self.program.display(), args.join(" "));
        Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| Error::AnalyzerSpawn {
                program: self.program.display().to_string(),
                source,
            })
    }
}

/// Whether stderr says the flag is not a recognized argument.
///
/// Covers clap 2/3 ("Found argument '-q' which wasn't expected") and clap 4
/// ("unexpected argument '-q' found").
pub fn rejects_flag(stderr: &str, flag: &str) -> bool {
    stderr.contains(flag) && (stderr.contains("Found argument") || stderr.contains("unexpected argument"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments() {
        let invoker = AnalyzerInvoker::new("target/debug/astgrep");
        assert_eq!(
            invoker.arguments("rules.yaml", Path::new("tmp/sql-extract"), true),
            vec!["-q", "analyze", "--language", "sql", "--config", "rules.yaml", "tmp/sql-extract"]
        );
        assert_eq!(
            invoker.arguments("rules.yaml", Path::new("tmp/sql-extract"), false)[0],
            "analyze"
        );
    }

    #[test]
    fn test_rejects_flag() {
        assert!(rejects_flag("error: Found argument '-q' which wasn't expected, or isn't valid in this context", "-q"));
        assert!(rejects_flag("error: unexpected argument '-q' found\n\nUsage: astgrep <COMMAND>", "-q"));
        assert!(!rejects_flag("error: rules file not found", "-q"));
    }

    #[test]
    fn test_missing_program() {
        let invoker = AnalyzerInvoker::new("/nonexistent/analyzer-binary");
        let err = invoker.run("rules.yaml", Path::new(".")).unwrap_err();
        assert!(matches!(err, Error::AnalyzerSpawn { .. }));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        /// Analyzer stand-in run through `sh`
        fn script_invoker(dir: &Path, script: &str) -> AnalyzerInvoker {
            let path = dir.join("analyzer.sh");
            std::fs::write(&path, script).unwrap();
            AnalyzerInvoker::from_config(&AnalyzerConfig {
                program: PathBuf::from("sh"),
                args: vec![path.display().to_string()],
                ..AnalyzerConfig::default()
            })
        }

        #[test]
        fn test_retries_without_quiet_flag() {
            let dir = tempfile::tempdir().unwrap();
            let invoker = script_invoker(
                dir.path(),
                r#"if [ "$1" = "-q" ]; then
  echo "error: Found argument '-q' which wasn't expected, or isn't valid in this context" >&2
  exit 2
fi
echo "INFO loading rules"
echo '{"findings":[],"summary":{"quiet":false}}'
"#,
            );

            let run = invoker.run("rules.yaml", dir.path()).unwrap();
            assert_eq!(run.raw["summary"]["quiet"], false);
            assert_eq!(run.raw_text, r#"{"findings":[],"summary":{"quiet":false}}"#);
            assert!(run.report.findings.is_empty());
        }

        #[test]
        fn test_odd_finding_fields_are_not_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let invoker = script_invoker(
                dir.path(),
                r#"echo '{"findings":[{"rule_id":null,"severity":1,"location":{"file":"a.sql","start_line":-1}}]}'"#,
            );

            let run = invoker.run("rules.yaml", dir.path()).unwrap();
            assert_eq!(run.report.findings.len(), 1);
            assert_eq!(run.report.findings[0].reported_file(), Some("a.sql"));
        }

        #[test]
        fn test_other_failures_are_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let invoker = script_invoker(dir.path(), "echo 'partial output'\necho 'rules.yaml: parse error' >&2\nexit 3\n");

            match invoker.run("rules.yaml", dir.path()).unwrap_err() {
                Error::AnalyzerFailed { stdout, stderr, .. } => {
                    assert_eq!(stdout, "partial output\n");
                    assert_eq!(stderr, "rules.yaml: parse error\n");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_unparseable_output_is_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let invoker = script_invoker(dir.path(), "echo 'INFO no json today'\necho 'WARN rules loaded: 0' >&2\n");

            match invoker.run("rules.yaml", dir.path()).unwrap_err() {
                Error::MalformedResult { stdout, stderr } => {
                    assert_eq!(stdout, "INFO no json today\n");
                    assert_eq!(stderr, "WARN rules loaded: 0\n");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_passes_language_and_config() {
            let dir = tempfile::tempdir().unwrap();
            let invoker = script_invoker(
                dir.path(),
                r#"printf '{"findings":[],"summary":{"args":"%s"}}\n' "$*""#,
            );

            let run = invoker.run("my-rules.yaml", Path::new("snippets")).unwrap();
            assert_eq!(
                run.raw["summary"]["args"],
                "-q analyze --language sql --config my-rules.yaml snippets"
            );
        }
    }
}
