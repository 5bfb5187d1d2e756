//! Check command - analyzes PHP files for issues

use crate::output::json::JsonFormatter;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use rayon::prelude::*;
use sachet_core::analysis::AnalysisEngine;
use sachet_core::config::load_config_or_default_with_warnings;
use sachet_core::diagnostic::{Diagnostic, Severity};
use sachet_core::parser::ParsedFile;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};
use walkdir::WalkDir;

const SUPPORTED_EXTENSIONS: &[&str] = &["php", "phtml"];

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to file or directory to analyze
    #[arg(value_name = "PATH", required_unless_present = "staged")]
    pub path: Option<PathBuf>,

    /// Analyze only git staged files
    #[arg(long)]
    pub staged: bool,

    /// Output format for diagnostics (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Fail on warnings (exit code 1)
    #[arg(long)]
    pub fail_on_warnings: bool,

    /// Filter diagnostics by minimum severity level (error, warning)
    #[arg(long, value_name = "LEVEL")]
    pub severity: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        self.configure_colors();

        let config_path = self.path.clone().unwrap_or_else(|| PathBuf::from("."));
        let config_result = load_config_or_default_with_warnings(&config_path);
        for warning in &config_result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
        let config = config_result.config;

        let files = if self.staged {
            get_staged_files()?
        } else {
            discover_files(&config_path)?
        };

        if files.is_empty() {
            if self.staged {
                println!("No staged PHP files found.");
            } else {
                println!("No PHP files found.");
            }
            return Ok(());
        }

        let engine = AnalysisEngine::with_config(&config);
        let min_severity = self.parse_severity()?;

        let all_diagnostics: Vec<Diagnostic> = files
            .par_iter()
            .filter_map(|file| {
                let content = fs::read_to_string(file).ok()?;
                let parsed = ParsedFile::from_source(&*file.to_string_lossy(), &content);
                Some(engine.analyze(&parsed))
            })
            .flatten()
            .filter(|d| d.severity >= min_severity)
            .collect();

        let total_files = files.len();
        let analyzed_path = if self.staged {
            "(staged files)".to_string()
        } else {
            config_path.to_string_lossy().to_string()
        };

        match self.format.as_str() {
            "json" => self.output_json(&all_diagnostics, &engine, total_files, &analyzed_path),
            _ => self.output_text(&all_diagnostics),
        }

        let error_count = all_diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error))
            .count();
        let warning_count = all_diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Warning))
            .count();

        let has_errors = error_count > 0;
        let has_warnings = warning_count > 0 && self.fail_on_warnings;

        if has_errors || has_warnings {
            process::exit(1);
        }

        Ok(())
    }

    fn parse_severity(&self) -> Result<Severity> {
        match self.severity.as_deref() {
            Some("error") => Ok(Severity::Error),
            Some("warning") => Ok(Severity::Warning),
            Some(other) => {
                anyhow::bail!("Invalid severity '{}'. Valid values: error, warning", other)
            }
            None => Ok(Severity::Warning),
        }
    }

    fn configure_colors(&self) {
        let no_color_env = std::env::var("NO_COLOR").is_ok();
        if self.no_color || no_color_env {
            colored::control::set_override(false);
        }
    }

    fn output_text(&self, diagnostics: &[Diagnostic]) {
        for diag in diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "error".red().bold(),
                Severity::Warning => "warning".yellow().bold(),
            };

            println!(
                "{}:{}:{}: {} [{}]: {}",
                diag.file,
                diag.line,
                diag.column,
                severity_str,
                diag.rule_id.dimmed(),
                diag.message
            );

            if let Some(suggestion) = &diag.suggestion {
                println!("  {} {}", "suggestion:".green(), suggestion);
            }
        }

        let error_count = diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error))
            .count();
        let warning_count = diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Warning))
            .count();

        if !diagnostics.is_empty() {
            println!();
            println!(
                "Found {} error(s) and {} warning(s)",
                error_count, warning_count
            );
        }
    }

    fn output_json(
        &self,
        diagnostics: &[Diagnostic],
        engine: &AnalysisEngine,
        total_files: usize,
        analyzed_path: &str,
    ) {
        let formatter = JsonFormatter::with_registry(engine.registry());
        println!(
            "{}",
            formatter.format(diagnostics, total_files, analyzed_path)
        );
    }
}

fn get_staged_files() -> Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-only", "--diff-filter=ACMR"])
        .output()
        .map_err(|e| anyhow::anyhow!("Failed to run git: {}. Is this a git repository?", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Git command failed: {}", stderr.trim());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let files: Vec<PathBuf> = stdout
        .lines()
        .map(PathBuf::from)
        .filter(|p| is_supported_file(p))
        .filter(|p| p.exists())
        .collect();

    Ok(files)
}

fn discover_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    if path.is_file() {
        if is_supported_file(path) {
            return Ok(vec![path.to_path_buf()]);
        } else {
            return Ok(vec![]);
        }
    }

    let files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();

    Ok(files)
}

fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || name == "vendor" || name == "node_modules")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_files_finds_single_php_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.php");
        File::create(&file_path).unwrap();

        let files = discover_files(&file_path).unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0], file_path);
    }

    #[test]
    fn discover_files_finds_files_in_directory() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.php")).unwrap();
        File::create(dir.path().join("b.phtml")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 2);
    }

    #[test]
    fn discover_files_ignores_unsupported_extensions() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("test.php")).unwrap();
        File::create(dir.path().join("readme.md")).unwrap();
        File::create(dir.path().join("style.css")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn discover_files_skips_hidden_directories() {
        let dir = tempdir().unwrap();
        let hidden_dir = dir.path().join(".hidden");
        fs::create_dir(&hidden_dir).unwrap();
        File::create(hidden_dir.join("hidden.php")).unwrap();
        File::create(dir.path().join("visible.php")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().contains("visible.php"));
    }

    #[test]
    fn discover_files_skips_vendor() {
        let dir = tempdir().unwrap();
        let vendor_dir = dir.path().join("vendor");
        fs::create_dir(&vendor_dir).unwrap();
        File::create(vendor_dir.join("dep.php")).unwrap();
        File::create(dir.path().join("src.php")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().contains("src.php"));
    }

    #[test]
    fn discover_files_recursive() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("includes");
        fs::create_dir(&subdir).unwrap();
        File::create(dir.path().join("plugin.php")).unwrap();
        File::create(subdir.join("admin.php")).unwrap();

        let files = discover_files(dir.path()).unwrap();

        assert_eq!(files.len(), 2);
    }

    #[test]
    fn is_supported_file_accepts_php_extensions() {
        assert!(is_supported_file(Path::new("test.php")));
        assert!(is_supported_file(Path::new("test.phtml")));
    }

    #[test]
    fn is_supported_file_rejects_other_extensions() {
        assert!(!is_supported_file(Path::new("test.md")));
        assert!(!is_supported_file(Path::new("test.js")));
        assert!(!is_supported_file(Path::new("test.rs")));
    }

    #[test]
    fn check_args_parse_severity_valid() {
        let args = CheckArgs {
            path: Some(PathBuf::from(".")),
            staged: false,
            format: "text".to_string(),
            fail_on_warnings: false,
            severity: Some("error".to_string()),
            no_color: false,
        };

        assert!(matches!(args.parse_severity().unwrap(), Severity::Error));
    }

    #[test]
    fn check_args_parse_severity_invalid() {
        let args = CheckArgs {
            path: Some(PathBuf::from(".")),
            staged: false,
            format: "text".to_string(),
            fail_on_warnings: false,
            severity: Some("invalid".to_string()),
            no_color: false,
        };

        assert!(args.parse_severity().is_err());
    }

    #[test]
    fn check_runs_analysis_on_clean_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.php");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "<?php echo esc_html( $title );").unwrap();

        let args = CheckArgs {
            path: Some(file_path),
            staged: false,
            format: "json".to_string(),
            fail_on_warnings: false,
            severity: None,
            no_color: true,
        };

        assert!(args.run().is_ok());
    }
}
