use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::extract::java::DEFAULT_SQL_METHODS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Files or directories to scan
    pub targets: Vec<PathBuf>,
    /// Rule configuration handed to the analyzer as-is
    pub rules: Option<String>,
    /// Where snippets and reports are written
    pub output_dir: PathBuf,
    /// Extensions eligible for extraction (leading dot optional)
    pub extensions: Vec<String>,
    /// Honour .gitignore/.ignore files while walking directories
    pub respect_ignore_files: bool,
    pub analyzer: AnalyzerConfig,
    pub java: JavaConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            targets: vec![PathBuf::from(".")],
            rules: None,
            output_dir: PathBuf::from("tmp/sql-extract"),
            extensions: vec!["java".to_string(), "xml".to_string()],
            respect_ignore_files: false,
            analyzer: AnalyzerConfig::default(),
            java: JavaConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Eligible extensions, lowercased and without the leading dot
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Analyzer executable
    pub program: PathBuf,
    /// Arguments placed before everything else (e.g. a wrapper script)
    pub args: Vec<String>,
    /// Language hint for the snippets
    pub language: String,
    /// Flag that silences analyzer logging; dropped if the binary rejects it
    pub quiet_flag: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("target/debug/astgrep"),
            args: Vec::new(),
            language: "sql".to_string(),
            quiet_flag: Some("-q".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaConfig {
    /// Method names whose call arguments are treated as SQL
    pub sql_methods: Vec<String>,
}

impl Default for JavaConfig {
    fn default() -> Self {
        Self {
            sql_methods: DEFAULT_SQL_METHODS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("sqlharvest.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<HarvestConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: HarvestConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &HarvestConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
