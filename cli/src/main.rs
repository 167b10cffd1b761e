use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{ArgAction, Parser};
use console::style;
use serde::Serialize;
use tsg_core::{
    default_blocks, parse_ignore_file, ConfigBlock, ConfigFile, Issue, LintReport, Linter,
    Severity, TableConverter,
};
use walkdir::WalkDir;

const IGNORE_FILE: &str = ".tsgignore";

/// Taiwan Script Guard CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "tsg",
    about = "Lint documents for Simplified-Chinese characters and Mainland-Chinese terms."
)]
struct Args {
    /// Path to config file (YAML). Defaults to tsg.yml if present.
    #[arg(long, default_value = "tsg.yml")]
    config: PathBuf,

    /// Apply safe fixes in place instead of only reporting.
    #[arg(long, action = ArgAction::SetTrue)]
    fix: bool,

    /// Emit JSON output for automation.
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Suppress per-file output.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,

    /// Directory holding additional compiled dictionaries.
    #[arg(long, value_name = "DIR")]
    dict_dir: Option<PathBuf>,

    /// Files or directories to lint.
    #[arg(value_name = "PATH", default_value = ".", num_args = 0..)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct OutputReport {
    files: Vec<LintReport>,
    total_errors: usize,
    total_warnings: usize,
    total_infos: usize,
    fixed_files: usize,
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let (blocks, config_root) = load_config(&args.config)?;
    let mut linter = Linter::new(
        blocks,
        Arc::new(TableConverter::builtin()),
        args.dict_dir.clone(),
    );
    linter.set_ignore_patterns(load_ignore_patterns(&config_root));

    let mut files = collect_files(&args.paths, &linter, &config_root);
    files.sort();

    let mut fixed_files = 0usize;
    if args.fix {
        for path in &files {
            let key = scope_key(path, &config_root);
            match linter.fix_file_as(path, &key) {
                Ok(true) => fixed_files += 1,
                Ok(false) => {}
                // A failed fix leaves the file untouched; keep going.
                Err(err) => log::warn!("{err:#}"),
            }
        }
    }

    let reports: Vec<LintReport> = files
        .iter()
        .map(|path| {
            let key = scope_key(path, &config_root);
            let mut report = linter.lint_file_as(path, &key);
            report.path = PathBuf::from(key);
            report
        })
        .collect();

    let mut total_errors = 0usize;
    let mut total_warnings = 0usize;
    let mut total_infos = 0usize;
    for report in &reports {
        for issue in &report.issues {
            match issue.severity {
                Severity::Error => total_errors += 1,
                Severity::Warning => total_warnings += 1,
                Severity::Info => total_infos += 1,
            }
        }
        if !args.json && !args.quiet && !report.issues.is_empty() {
            print_stylish(report);
        }
    }

    if args.json {
        let output = OutputReport {
            files: reports,
            total_errors,
            total_warnings,
            total_infos,
            fixed_files,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !args.quiet {
        print_summary(total_errors, total_warnings, total_infos, fixed_files, args.fix);
    }

    if total_errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<(Vec<ConfigBlock>, PathBuf)> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: ConfigFile = serde_yaml::from_str(&text)
            .with_context(|| format!("invalid config structure in {}", path.display()))?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .map_or_else(|| env::current_dir().context("working dir"), Ok)?;
        Ok((config.into_blocks(), root))
    } else {
        Ok((default_blocks(), env::current_dir()?))
    }
}

fn load_ignore_patterns(root: &Path) -> Vec<String> {
    match fs::read_to_string(root.join(IGNORE_FILE)) {
        Ok(content) => parse_ignore_file(&content),
        Err(_) => Vec::new(),
    }
}

fn collect_files(paths: &[PathBuf], linter: &Linter, root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).into_iter().flatten() {
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        }
    }
    files.retain(|path| !linter.scope().is_ignored(&scope_key(path, root)));
    files
}

/// Config-root-relative, slash-normalized path used for scope matching.
fn scope_key(path: &Path, root: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    let key = rel.to_string_lossy().replace('\\', "/");
    key.trim_start_matches("./").to_string()
}

fn is_supported(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "md" | "markdown" | "mdx" | "txt" | "rst"
        ),
        None => false,
    }
}

fn print_stylish(report: &LintReport) {
    println!("{}", style(report.path.display()).bold());
    let width = report
        .issues
        .iter()
        .map(|i| format!("{}:{}", i.line, i.column).len())
        .max()
        .unwrap_or(0);
    for issue in &report.issues {
        // Pad before styling so ANSI codes do not skew the column.
        let position = format!("{:width$}", format!("{}:{}", issue.line, issue.column));
        println!(
            "  {}  {}  {}  {}",
            style(position).dim(),
            colored_severity(issue),
            issue.message,
            style(&issue.rule).dim(),
        );
    }
    println!();
}

fn colored_severity(issue: &Issue) -> String {
    let name = format!("{:7}", issue.severity.to_string());
    match issue.severity {
        Severity::Error => style(name).red().to_string(),
        Severity::Warning => style(name).yellow().to_string(),
        Severity::Info => style(name).cyan().to_string(),
    }
}

fn print_summary(
    errors: usize,
    warnings: usize,
    infos: usize,
    fixed_files: usize,
    fix_mode: bool,
) {
    if fix_mode {
        println!("{} file(s) fixed", fixed_files);
    }
    let total = errors + warnings + infos;
    if total == 0 {
        println!("{}", style("✔ no problems found").green());
    } else {
        println!(
            "{}",
            style(format!(
                "✖ {total} problem(s) ({errors} error(s), {warnings} warning(s), {infos} info)"
            ))
            .bold()
        );
    }
}
