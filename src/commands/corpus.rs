use crate::*;

pub fn handle_tokens_commands(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let Commands::Tokens { command } = &cli.command else {
        return Ok(false);
    };
    let source = BoundedFs {
        max_bytes: config.limits.max_file_bytes,
    };

    match command {
        TokenCommands::Count {
            path,
            table,
            encoding,
            no_cache,
        } => {
            if !path.exists() {
                anyhow::bail!("path not found: {}", path.display());
            }
            let counter = build_counter(&config.tokens, *encoding, *no_cache)?;
            let agg = count_path(path, &config.corpus, &source, &counter);
            counter.persist()?;
            tracing::info!(
                files = agg.files.len(),
                total = agg.total_tokens,
                encoding = %agg.encoding,
                "tokens counted"
            );

            let ok = agg.issues.is_empty();
            if cli.json {
                print_json(ok, &agg)?;
            } else if *table {
                print!("{}", render_table(&agg));
            } else {
                for f in &agg.files {
                    println!("{}\t{}\t{}", f.path, f.total_tokens, f.content_tokens);
                }
                println!("total\t{}\t{}", agg.total_tokens, agg.content_tokens);
            }
            for i in &agg.issues {
                eprintln!("{}", issue_row(i));
            }
            if !ok {
                std::process::exit(1);
            }
        }
        TokenCommands::Compare { a, b, encoding } => {
            let counter = build_counter(&config.tokens, *encoding, false)?;
            let cmp = compare(a, b, &source, &counter)?;
            counter.persist()?;
            print_one(cli.json, true, cmp, |c| {
                format!(
                    "{}\t{}\t{}\n{}\t{}\t{}\nreduction\t{:.1}%",
                    c.path_a,
                    c.tokens_a,
                    c.total_a,
                    c.path_b,
                    c.tokens_b,
                    c.total_b,
                    c.reduction * 100.0
                )
            })?;
        }
    }

    Ok(true)
}

pub fn handle_sync_command(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let Commands::Sync {
        full_dir,
        concise_dir,
        markdown,
    } = &cli.command
    else {
        return Ok(false);
    };
    for dir in [full_dir, concise_dir] {
        if !dir.is_dir() {
            anyhow::bail!("not a directory: {}", dir.display());
        }
    }

    let source = BoundedFs {
        max_bytes: config.limits.max_file_bytes,
    };
    let counter = build_counter(&config.tokens, None, false)?;
    let report = check_trees(
        full_dir,
        concise_dir,
        &config.sync,
        &config.corpus,
        &source,
        &counter,
        None,
    );
    counter.persist()?;

    let (errors, _) = count_severities(&report.issues);
    let ok = errors == 0;
    if cli.json {
        print_json(ok, &report)?;
    } else if *markdown {
        print!("{}", render_sync_markdown(&report));
    } else {
        for p in &report.pairs {
            println!(
                "{}\t{}\t{}\t{:.1}%\t{}",
                p.full_path,
                p.tokens_full,
                p.tokens_concise,
                p.reduction_ratio * 100.0,
                if p.in_band { "in-band" } else { "out-of-band" }
            );
        }
        for i in &report.issues {
            println!("{}", issue_row(i));
        }
    }
    if !ok {
        std::process::exit(1);
    }
    Ok(true)
}

pub fn handle_migrate_command(cli: &Cli, config: &Config) -> anyhow::Result<bool> {
    let Commands::Migrate {
        paths,
        dry_run,
        force,
        keep_source,
    } = &cli.command
    else {
        return Ok(false);
    };

    let source = BoundedFs {
        max_bytes: config.limits.max_file_bytes,
    };
    let opts = MigrateOptions {
        dry_run: *dry_run,
        force: *force,
        keep_source: *keep_source,
    };
    let outcomes: Vec<MigrationOutcome> = expand_inputs(paths, &config.corpus)
        .iter()
        .map(|p| migrate_file(p, &opts, &config.migration, &config.schema, &source))
        .collect();
    let failed = outcomes.iter().filter(|o| o.status.is_failure()).count();
    tracing::info!(files = outcomes.len(), failed, "migration finished");

    print_out(cli.json, failed == 0, &outcomes, |o| {
        let mut row = format!("{}\t{}\t{}", o.status, o.source, o.destination);
        if let Some(note) = &o.message {
            row.push_str(&format!("\t{note}"));
        }
        if let Some(diff) = &o.diff {
            row.push('\n');
            row.push_str(diff.trim_end());
        }
        row
    })?;
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(true)
}
