use crate::domain::issues::ValidationIssue;
use crate::domain::models::JsonOut;
use serde::Serialize;

pub fn print_json<T: Serialize>(ok: bool, data: T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&JsonOut { ok, data })?);
    Ok(())
}

pub fn print_out<T: Serialize>(
    json: bool,
    ok: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        print_json(ok, data)?;
    } else {
        for d in data {
            println!("{}", row(d));
        }
    }
    Ok(())
}

pub fn print_one<T: Serialize>(
    json: bool,
    ok: bool,
    data: T,
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        print_json(ok, data)?;
    } else {
        println!("{}", row(&data));
    }
    Ok(())
}

/// `path:line<TAB>severity<TAB>code<TAB>message`
pub fn issue_row(i: &ValidationIssue) -> String {
    format!("{}\t{}\t{}\t{}", i.location, i.severity, i.code, i.message)
}
