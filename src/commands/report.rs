use crate::*;

pub fn handle_report_command(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let Commands::Report {
        base,
        head,
        root,
        changed,
        markdown,
    } = &cli.command
    else {
        return Ok(false);
    };

    let provider: Box<dyn ChangeProvider> = if changed.is_empty() {
        Box::new(GitChangeProvider {
            repo_root: root.clone(),
        })
    } else {
        Box::new(StaticChangeProvider {
            repo_root: root.clone(),
            paths: changed.clone(),
        })
    };
    let source = BoundedFs {
        max_bytes: config.limits.max_file_bytes,
    };
    let counter = build_counter(&config.tokens, None, false)?;
    let report = run_report(
        root,
        base,
        head,
        provider.as_ref(),
        config,
        &source,
        &counter,
    )?;
    counter.persist()?;

    if cli.json {
        print_json(report.passed, &report)?;
    } else if *markdown {
        print!("{}", render_report_markdown(&report));
    } else {
        for f in &report.files {
            println!("{}\t{}\t{}\t{}", f.path, f.score, f.errors, f.warnings);
            for i in &f.issues {
                println!("  {}", issue_row(i));
            }
        }
        println!(
            "score {} ({} errors, {} warnings): {}",
            report.score,
            report.error_count,
            report.warning_count,
            if report.passed { "passed" } else { "failed" }
        );
    }
    if !report.passed {
        std::process::exit(1);
    }
    Ok(true)
}
