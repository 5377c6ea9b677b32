use std::collections::HashSet;
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use unicode_width::UnicodeWidthStr;

use crate::app::actions::{records_label, ActionDispatcher, Outcome};
use crate::app::App;
use crate::config::AppConfig;
use crate::store::{Field, LoadOutcome, Record, RecordDraft, RecordStore};

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Topic of the record (prompted if omitted)
    pub topic: Option<String>,
    /// Category of the record (prompted if omitted)
    pub category: Option<String>,
    /// Description of the record (prompted if omitted)
    pub description: Option<String>,
    /// Importance of the record (prompted if omitted)
    pub importance: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// Record identifiers to remove
    #[arg(required = true)]
    pub ids: Vec<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Term matched case-insensitively against every text field
    #[arg(required = true)]
    pub term: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// JSON file to read records from
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Destination JSON file (overwritten)
    pub path: PathBuf,
}

pub fn run_tui(config: Arc<AppConfig>) -> Result<()> {
    let mut app = App::new(config);
    app.run()
}

pub fn list_records(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    if store.is_empty() {
        println!("No records.");
        return Ok(());
    }
    print!("{}", format_records(&store.view()));
    Ok(())
}

pub fn add_record(config: &AppConfig, args: AddArgs) -> Result<()> {
    let mut store = open_store(config)?;
    let draft = RecordDraft::new(
        value_or_prompt(args.topic, Field::Topic)?,
        value_or_prompt(args.category, Field::Category)?,
        value_or_prompt(args.description, Field::Description)?,
        value_or_prompt(args.importance, Field::Importance)?,
    );
    let mut dispatcher = ActionDispatcher::new(&mut store);
    let added = dispatcher.add(draft);
    let message = added.report.message.clone();
    into_result(added)?;
    into_result(dispatcher.save())?;
    println!("{message}");
    Ok(())
}

pub fn remove_records(config: &AppConfig, args: RemoveArgs) -> Result<()> {
    let mut store = open_store(config)?;
    let ids: HashSet<u64> = args.ids.into_iter().collect();
    let mut dispatcher = ActionDispatcher::new(&mut store);
    let outcome = dispatcher.remove(&ids);
    let message = outcome.report.message.clone();
    if into_result(outcome)? > 0 {
        into_result(dispatcher.save())?;
    }
    println!("{message}");
    Ok(())
}

pub fn search_records(config: &AppConfig, args: SearchArgs) -> Result<()> {
    let mut store = open_store(config)?;
    let output = run_search(&mut store, &args.term.join(" "))?;
    print!("{output}");
    Ok(())
}

fn run_search(store: &mut RecordStore, raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        bail!("search term cannot be empty");
    }
    let view = store.set_search_term(raw);
    if view.is_empty() {
        return Ok("No matches found.\n".to_string());
    }
    Ok(format_records(&view))
}

pub fn import_records(config: &AppConfig, args: ImportArgs) -> Result<()> {
    let mut store = RecordStore::new(config.store.id_policy);
    match store
        .load(&args.path)
        .with_context(|| format!("importing {}", args.path.display()))?
    {
        LoadOutcome::Loaded { .. } => {}
        LoadOutcome::Missing => bail!("{} does not exist", args.path.display()),
    }
    let target = &config.store.data_file;
    store
        .persist(target)
        .with_context(|| format!("writing imported records to {}", target.display()))?;
    tracing::info!(
        from = %args.path.display(),
        to = %target.display(),
        count = store.len(),
        "imported records"
    );
    println!(
        "Imported {} from {} into {}",
        records_label(store.len()),
        args.path.display(),
        target.display()
    );
    Ok(())
}

pub fn export_records(config: &AppConfig, args: ExportArgs) -> Result<()> {
    let mut store = open_store(config)?;
    let outcome = ActionDispatcher::new(&mut store).export(&args.path);
    let message = outcome.report.message.clone();
    into_result(outcome)?;
    println!("{message}");
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<RecordStore> {
    let mut store = RecordStore::new(config.store.id_policy);
    let path = &config.store.data_file;
    store
        .load(path)
        .with_context(|| format!("opening record file {}", path.display()))?;
    Ok(store)
}

fn into_result<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome.value {
        Some(value) => Ok(value),
        None => bail!("{}", outcome.report.message),
    }
}

fn value_or_prompt(value: Option<String>, field: Field) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    if !atty::is(atty::Stream::Stdin) {
        bail!("missing {field}; pass it as an argument");
    }
    prompt(field.label())
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .with_context(|| format!("reading {label}"))?;
    Ok(input.trim_end().to_owned())
}

/// Renders records as a left-aligned text table sized by display width.
pub fn format_records(records: &[&Record]) -> String {
    let header: Vec<String> = std::iter::once("ID")
        .chain(Field::ALL.iter().map(|field| field.label()))
        .map(str::to_owned)
        .collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            std::iter::once(record.id.to_string())
                .chain(record.text_fields().iter().map(|value| value.to_string()))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|cell| cell.width()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();

    let mut out = String::new();
    for row in std::iter::once(&header)
        .chain(std::iter::once(&rule))
        .chain(rows.iter())
    {
        let mut line = String::new();
        for (idx, (cell, width)) in row.iter().zip(&widths).enumerate() {
            if idx > 0 {
                line.push_str("  ");
            }
            line.push_str(cell);
            line.push_str(&" ".repeat(width - cell.width()));
        }
        let _ = writeln!(&mut out, "{}", line.trim_end());
    }
    out
}
