use crate::*;
use crate::domain::issues::{IssueCode, Location, ValidationIssue};
use crate::services::fsio::read_issue;
use std::path::{Path, PathBuf};

fn to_file_check(checked: CheckedFile) -> FileCheck {
    let (errors, warnings) = count_severities(&checked.issues);
    FileCheck {
        path: checked.path,
        valid: errors == 0,
        errors,
        warnings,
        issues: checked.issues,
    }
}

fn check_report(files: Vec<FileCheck>) -> CheckReport {
    let summary = CheckSummary {
        total: files.len(),
        passed: files.iter().filter(|f| f.valid).count(),
        failed: files.iter().filter(|f| !f.valid).count(),
        errors: files.iter().map(|f| f.errors).sum(),
        warnings: files.iter().map(|f| f.warnings).sum(),
    };
    CheckReport { files, summary }
}

pub fn handle_check_commands(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let (paths, stages, engine_kind) = match &cli.command {
        Commands::Lint {
            paths,
            check,
            engine,
        } => (
            paths,
            Stages {
                schema: *check,
                lint: true,
            },
            *engine,
        ),
        Commands::Validate { paths } => (
            paths,
            Stages {
                schema: true,
                lint: false,
            },
            EngineKind::None,
        ),
        _ => return Ok(false),
    };

    let source = BoundedFs {
        max_bytes: config.limits.max_file_bytes,
    };
    let engine = engine_for(engine_kind)?;
    let checker = FileChecker::new(config, &source)?.with_engine(engine.as_deref());
    let files: Vec<(PathBuf, String)> = expand_inputs(paths, &config.corpus)
        .into_iter()
        .map(|p| {
            let display = display_path(&p);
            (p, display)
        })
        .collect();

    let checked = check_all(&checker, &files, stages, config.report.workers)?;
    let report = check_report(checked.into_iter().map(to_file_check).collect());
    tracing::info!(
        files = report.summary.total,
        errors = report.summary.errors,
        warnings = report.summary.warnings,
        "check finished"
    );

    let ok = report.summary.errors == 0;
    if cli.json {
        print_json(ok, &report)?;
    } else {
        for f in &report.files {
            for i in &f.issues {
                println!("{}", issue_row(i));
            }
        }
        println!(
            "{} files, {} passed, {} errors, {} warnings",
            report.summary.total,
            report.summary.passed,
            report.summary.errors,
            report.summary.warnings
        );
    }
    if !ok {
        std::process::exit(1);
    }
    Ok(true)
}

pub fn handle_format_command(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let Commands::Format {
        paths,
        check,
        engine,
    } = &cli.command
    else {
        return Ok(false);
    };

    let Some(engine) = engine_for(*engine)? else {
        anyhow::bail!("format needs an engine (builtin or markdownlint)");
    };
    let source = BoundedFs {
        max_bytes: config.limits.max_file_bytes,
    };

    let outcomes: Vec<FormatOutcome> = expand_inputs(paths, &config.corpus)
        .iter()
        .map(|path| format_file(path, &*engine, &source, *check))
        .collect();

    let failed = outcomes.iter().filter(|o| o.failed()).count();
    let pending = *check && outcomes.iter().any(|o| o.changed);
    if cli.json {
        print_json(!pending && failed == 0, &outcomes)?;
    } else {
        for o in &outcomes {
            if o.failed() {
                for issue in &o.issues {
                    println!("failed\t{}\t{}", o.path, issue.message);
                }
            } else if o.changed {
                let verb = if o.written { "formatted" } else { "would format" };
                println!("{verb}\t{}", o.path);
            }
        }
    }
    if pending || failed > 0 {
        std::process::exit(1);
    }
    Ok(true)
}

/// Format one file; read, engine and write failures stay on this file's outcome.
fn format_file(
    path: &Path,
    engine: &dyn MarkdownEngine,
    source: &dyn FileSource,
    check: bool,
) -> FormatOutcome {
    let shown = display_path(path);
    let mut outcome = FormatOutcome {
        path: shown.clone(),
        changed: false,
        written: false,
        issues: Vec::new(),
    };
    let raw = match source.read_text(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %shown, error = %e, "format skipped");
            outcome.issues.push(read_issue(&e, &shown));
            return outcome;
        }
    };
    let formatted = match engine.format(&raw) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %shown, error = %e, "format failed");
            outcome.issues.push(ValidationIssue::error(
                IssueCode::EngineFailed,
                Location::file(&shown),
                format!("{} engine did not run: {e}", engine.name()),
            ));
            return outcome;
        }
    };
    outcome.changed = formatted != raw;
    if outcome.changed && !check {
        match std::fs::write(path, &formatted) {
            Ok(()) => outcome.written = true,
            Err(e) => outcome.issues.push(ValidationIssue::error(
                IssueCode::FileUnwritable,
                Location::file(&shown),
                format!("cannot write {shown}: {e}"),
            )),
        }
    }
    tracing::debug!(path = %shown, changed = outcome.changed, engine = engine.name(), "formatted");
    outcome
}
