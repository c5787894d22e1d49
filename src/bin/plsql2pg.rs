//! plsql2pg: Oracle trigger to PL/pgSQL translator
//!
//! # Usage
//!
//! ```bash
//! # Translate to stdout
//! plsql2pg translate triggers/orders_biu.sql
//!
//! # Wrap in CREATE FUNCTION / CREATE TRIGGER, one .sql per input
//! plsql2pg translate triggers/*.sql --wrap function -o out/
//!
//! # Inspect the parse
//! plsql2pg ast triggers/orders_biu.sql
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Serialize;

use plsql2pg::lexer::{TokenKind, tokenize_partial};
use plsql2pg::prelude::*;

#[derive(Parser)]
#[command(name = "plsql2pg")]
#[command(version)]
#[command(about = "Translate Oracle PL/SQL triggers into PostgreSQL PL/pgSQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    plsql2pg translate trg_orders.sql
    plsql2pg translate src/*.sql --wrap function -o out/
    plsql2pg translate src/*.sql --format json > report.json
    plsql2pg mapping > mapping.toml")]
struct Cli {
    /// Config file (default: ./plsql2pg.toml, then the user config dir)
    #[arg(short, long, global = true, env = "PLSQL2PG_CONFIG")]
    config: Option<PathBuf>,

    /// Mapping TOML, overriding the configured one
    #[arg(short, long, global = true)]
    mapping: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum Wrap {
    Block,
    Function,
}

impl From<Wrap> for WrapMode {
    fn from(wrap: Wrap) -> Self {
        match wrap {
            Wrap::Block => WrapMode::Block,
            Wrap::Function => WrapMode::Function,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Translate trigger files
    Translate {
        /// Trigger source files; each is translated independently
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write one .sql per input (or report.json) into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "sql")]
        format: OutputFormat,

        /// Packaging of the generated block
        #[arg(short, long, value_enum)]
        wrap: Option<Wrap>,

        /// Don't print diagnostics
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the parsed tree as JSON
    Ast { file: PathBuf },
    /// Print the token stream
    Tokens { file: PathBuf },
    /// Print the effective mapping table as TOML
    Mapping,
}

#[derive(Serialize)]
struct Report {
    generated_at: String,
    translated: usize,
    failed: usize,
    units: Vec<UnitReport>,
}

#[derive(Serialize)]
struct UnitReport {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    statements_found: usize,
    raw_statements: usize,
    diagnostics: Vec<Diagnostic>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let config = Config::discover(cli.config.as_deref()).context("loading config")?;
    let mapping = match &cli.mapping {
        Some(path) => DialectMapping::load(path)
            .with_context(|| format!("loading mapping {}", path.display()))?,
        None => config.dialect_mapping().context("loading mapping")?,
    };

    match &cli.command {
        Commands::Translate {
            files,
            output,
            format,
            wrap,
            quiet,
        } => {
            let mut options = config.output.clone();
            if let Some(wrap) = wrap {
                options.wrap = (*wrap).into();
            }
            translate_files(files, output.as_deref(), *format, *quiet, &mapping, &options)
        }
        Commands::Ast { file } => {
            let source = read_source(file)?;
            let parsed = plsql2pg::parse(&source)?;
            println!("{}", parsed.unit.to_json()?);
            print_diagnostics(file, &parsed.diagnostics);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tokens { file } => {
            let source = read_source(file)?;
            let (tokens, error) = tokenize_partial(&source);
            for token in &tokens {
                let kind = format!("{:<15}", format!("{:?}", token.kind));
                let kind = match token.kind {
                    TokenKind::Keyword => kind.blue(),
                    TokenKind::StringLiteral | TokenKind::NumericLiteral => kind.green(),
                    TokenKind::BindVariable => kind.magenta(),
                    TokenKind::Trailing => kind.red(),
                    _ => kind.normal(),
                };
                println!("{:>6}  {} {}", token.offset, kind, token.text);
            }
            if let Some(error) = error {
                eprintln!("{} {}", "error:".red().bold(), error);
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Mapping => {
            print!("{}", mapping.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn translate_files(
    files: &[PathBuf],
    output: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
    mapping: &DialectMapping,
    options: &GenerateOptions,
) -> Result<ExitCode> {
    if let Some(dir) = output {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut units = Vec::with_capacity(files.len());
    for file in files {
        let result = read_source(file)
            .and_then(|source| Ok(plsql2pg::translate(&source, mapping, options)?));
        let name = file.display().to_string();
        match result {
            Ok(translation) => {
                if !quiet {
                    print_diagnostics(file, &translation.diagnostics);
                }
                if let OutputFormat::Sql = format {
                    emit_sql(file, output, &translation.sql)?;
                }
                units.push(UnitReport {
                    file: name,
                    sql: Some(translation.sql),
                    error: None,
                    statements_found: translation.statements_found,
                    raw_statements: translation.unit.stats().raw,
                    diagnostics: translation.diagnostics.into_vec(),
                });
            }
            Err(e) => {
                tracing::warn!("{}: {:#}", name, e);
                eprintln!("{} {}: {:#}", "error:".red().bold(), name, e);
                units.push(UnitReport {
                    file: name,
                    sql: None,
                    error: Some(format!("{:#}", e)),
                    statements_found: 0,
                    raw_statements: 0,
                    diagnostics: Vec::new(),
                });
            }
        }
    }

    let failed = units.iter().filter(|u| u.error.is_some()).count();
    let report = Report {
        generated_at: chrono::Utc::now().to_rfc3339(),
        translated: units.len() - failed,
        failed,
        units,
    };

    if let OutputFormat::Json = format {
        let json = serde_json::to_string_pretty(&report)?;
        match output {
            Some(dir) => fs::write(dir.join("report.json"), json + "\n")?,
            None => println!("{}", json),
        }
    }

    let summary = format!("{} translated, {} failed", report.translated, report.failed);
    if failed == 0 {
        eprintln!("{} {}", "✓".green().bold(), summary);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} {}", "✗".red().bold(), summary);
        Ok(ExitCode::FAILURE)
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn emit_sql(file: &Path, output: Option<&Path>, sql: &str) -> Result<()> {
    match output {
        Some(dir) => {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "trigger".to_string());
            let target = dir.join(format!("{}.sql", stem));
            fs::write(&target, sql).with_context(|| format!("writing {}", target.display()))?;
            eprintln!("{} {}", "wrote".dimmed(), target.display());
        }
        None => {
            println!("-- {}", file.display());
            print!("{}", sql);
            println!();
        }
    }
    Ok(())
}

fn print_diagnostics(file: &Path, diagnostics: &Diagnostics) {
    for d in diagnostics {
        let level = match d.severity {
            Severity::Warning => "warning".yellow().bold(),
            Severity::Error => "error".red().bold(),
        };
        let mut location = format!("{}", file.display());
        if let Some(path) = &d.path {
            location.push_str(&format!(" ({})", path));
        }
        eprintln!("{}[{}] {}: {}", level, d.stage, location.dimmed(), d.message);
    }
}
