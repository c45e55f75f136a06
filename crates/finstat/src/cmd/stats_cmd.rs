//! finstat - Statistics over personal finance ledgers.
//!
//! # Usage
//!
//! ```bash
//! finstat ledger.json totals --category Food --interval week
//! finstat ledger.json category Food --days 30 --last 3m
//! finstat ledger.json daily Food --from 2024-01-01 --to 2024-01-31
//! finstat ledger.json list --limit 7
//! finstat ledger.json rename Food Groceries
//! ```
//!
//! Output is written only once a command has fully succeeded; on any error
//! nothing is printed to stdout and the exit code is 2.

use crate::output::{OutputFormat, Table};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use finstat_core::{OperationBody, OperationKind};
use finstat_loader::{LoadResult, Options};
use finstat_query::{
    calc_stats, compile, rename_category, CategoryStats, Interval, OperationQuery, Period,
    Predicate, Reducer, SortDirection, SumReducer, TimeSpan,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Compute statistics from finstat ledger files.
#[derive(Parser, Debug)]
#[command(name = "finstat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The ledger file to process
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// The command to run
    #[command(subcommand)]
    command: Command,

    /// Report currency (default: the ledger's base currency)
    #[arg(long, global = true, value_name = "CODE")]
    currency: Option<String>,

    /// Date to treat as today (default: the system date)
    #[arg(long, global = true, value_name = "DATE")]
    today: Option<NaiveDate>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-interval and running totals for a filter
    Totals(TotalsArgs),
    /// Totals, averages and goal pace for one category
    Category(CategoryArgs),
    /// Per-day and cumulative amounts for one category
    Daily {
        /// Category name
        name: String,
        #[command(flatten)]
        span: SpanArgs,
    },
    /// Operations grouped by date, newest first
    List(ListArgs),
    /// Rename a category across the ledger and save the file
    Rename {
        /// Current name
        old: String,
        /// New name
        new: String,
    },
}

/// Date range shared by several commands.
#[derive(clap::Args, Debug, Clone, Default)]
struct SpanArgs {
    /// First day (default: first day of the current month)
    #[arg(long, value_name = "DATE")]
    from: Option<NaiveDate>,

    /// Last day (default: last day of the current month, or today with --from)
    #[arg(long, value_name = "DATE")]
    to: Option<NaiveDate>,
}

impl SpanArgs {
    fn span(&self, today: NaiveDate) -> Result<TimeSpan> {
        let month = TimeSpan::month_of(today);
        let start = self.from.unwrap_or(month.start());
        let end = self
            .to
            .unwrap_or(if self.from.is_some() { today } else { month.end() });
        Ok(TimeSpan::new(start, end)?)
    }
}

#[derive(clap::Args, Debug)]
struct TotalsArgs {
    /// Only incomes and expenses with a split in this category (repeatable)
    #[arg(short = 'c', long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Only operations touching this account (repeatable)
    #[arg(short = 'a', long = "account", value_name = "NAME")]
    accounts: Vec<String>,

    /// Only operations of this type (repeatable)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    types: Vec<OperationKind>,

    /// Bucket size: day, week, month or year (default: one bucket)
    #[arg(short, long)]
    interval: Option<Interval>,

    /// Additional predicate as JSON
    #[arg(long, value_name = "JSON")]
    filter: Option<String>,

    /// Count incomes as positive and expenses as negative
    #[arg(long)]
    signed: bool,

    #[command(flatten)]
    span: SpanArgs,
}

#[derive(clap::Args, Debug)]
struct CategoryArgs {
    /// Category name
    name: String,

    /// Days the averages are scaled to (default: the ledger's average_days)
    #[arg(short, long)]
    days: Option<u32>,

    /// Trailing window for the recent average, e.g. 30d, 2w, 3m, 1y
    #[arg(short, long, default_value = "30d")]
    last: Period,

    #[command(flatten)]
    span: SpanArgs,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Only operations touching this account (repeatable)
    #[arg(short = 'a', long = "account", value_name = "NAME")]
    accounts: Vec<String>,

    /// Show at most this many dates
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// First day
    #[arg(long, value_name = "DATE")]
    from: Option<NaiveDate>,

    /// Last day
    #[arg(long, value_name = "DATE")]
    to: Option<NaiveDate>,
}

/// Main entry point for the finstat command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match execute(&args) {
        Ok(output) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(&output).and_then(|()| stdout.flush()) {
                eprintln!("error: {e}");
                return ExitCode::from(2);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(io::stderr)
            .init();
    } else {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

/// Run the command on a single-threaded runtime and return its rendered output.
fn execute(args: &Args) -> Result<Vec<u8>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let mut output = Vec::new();
    runtime.block_on(run(args, &mut output))?;
    Ok(output)
}

async fn run<W: Write>(args: &Args, out: &mut W) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("file not found: {}", args.file.display());
    }

    let ledger = finstat_loader::load(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;

    // Report settings; the ledger's own options are saved untouched.
    let mut options = ledger.options.clone();
    if let Some(currency) = &args.currency {
        options.set("base_currency", currency)?;
    }
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    match &args.command {
        Command::Totals(totals) => {
            report_totals(&ledger, &options, totals, today, args.format, out).await
        }
        Command::Category(category) => {
            report_category(&ledger, &options, category, today, args.format, out).await
        }
        Command::Daily { name, span } => {
            report_daily(&ledger, name, span.span(today)?, today, args.format, out).await
        }
        Command::List(list) => report_list(&ledger, list, args.format, out).await,
        Command::Rename { old, new } => {
            rename(&ledger, &args.file, old, new, args.format, out).await
        }
    }
}

fn format_amount(amount: Decimal) -> String {
    format!("{amount:.2}")
}

fn totals_predicate(args: &TotalsArgs) -> Result<Predicate> {
    let mut predicate = Predicate::any();
    if let Some(categories) = args
        .categories
        .iter()
        .map(Predicate::category)
        .reduce(Predicate::or)
    {
        predicate = predicate
            .and(Predicate::kinds([OperationKind::Income, OperationKind::Expense]))
            .and(categories);
    }
    if !args.accounts.is_empty() {
        predicate = predicate.and(Predicate::accounts(&args.accounts));
    }
    if !args.types.is_empty() {
        predicate = predicate.and(Predicate::kinds(args.types.iter().copied()));
    }
    if let Some(json) = &args.filter {
        predicate = predicate.and(Predicate::from_json(json).context("invalid --filter")?);
    }
    compile(&predicate).with_context(|| format!("invalid filter {predicate}"))?;
    Ok(predicate)
}

async fn report_totals<W: Write>(
    ledger: &LoadResult,
    options: &Options,
    args: &TotalsArgs,
    today: NaiveDate,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let predicate = totals_predicate(args)?;
    let span = args.span.span(today)?;
    let currency = options.base_currency.as_str();

    let shape = |reducer: SumReducer| {
        let reducer = reducer.for_categories(&args.categories);
        if args.signed {
            reducer.signed()
        } else {
            reducer
        }
    };
    let mut reducers: BTreeMap<&str, Box<dyn Reducer<Decimal>>> = BTreeMap::new();
    match args.interval {
        Some(interval) => {
            reducers.insert(
                "amount",
                Box::new(shape(SumReducer::per_interval(interval, currency))),
            );
            reducers.insert(
                "cumulative",
                Box::new(shape(SumReducer::cumulative(interval, currency))),
            );
        }
        None => {
            reducers.insert("amount", Box::new(shape(SumReducer::period_total(currency))));
        }
    }

    let stats = calc_stats(
        &ledger.operations,
        &ledger.rates,
        &predicate,
        &span,
        today,
        &reducers,
    )
    .await
    .with_context(|| format!("failed to compute totals for {span}"))?;

    let amounts = stats.get("amount").map_or(&[][..], Vec::as_slice);
    let cumulative = stats.get("cumulative").map(Vec::as_slice);
    let mut table = Table::new(if cumulative.is_some() {
        vec!["start", "end", "amount", "cumulative"]
    } else {
        vec!["start", "end", "amount"]
    });
    for (i, bounds) in span.intervals(args.interval).iter().enumerate() {
        let mut row = vec![
            Some(bounds.start.to_string()),
            Some(bounds.end.to_string()),
            amounts.get(i).copied().map(format_amount),
        ];
        if let Some(cumulative) = cumulative {
            row.push(cumulative.get(i).copied().map(format_amount));
        }
        table.push(row);
    }
    table.write(format, out)
}

async fn report_category<W: Write>(
    ledger: &LoadResult,
    options: &Options,
    args: &CategoryArgs,
    today: NaiveDate,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let span = args.span.span(today)?;
    let stats = CategoryStats::for_category(
        &ledger.operations,
        &ledger.categories,
        &ledger.rates,
        &args.name,
        span,
        today,
    )
    .await
    .with_context(|| format!("failed to compute statistics for {}", args.name))?;
    let days = args.days.unwrap_or(options.average_days);
    let summary = stats.summary(days, args.last).await?;

    if format == OutputFormat::Json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        return Ok(());
    }

    let mut table = Table::new(["metric", "value"]);
    let rows = [
        ("category", Some(args.name.clone())),
        ("currency", Some(summary.currency.clone())),
        ("span", Some(span.to_string())),
        ("elapsed_days", Some(summary.elapsed_days.to_string())),
        ("period_total", Some(format_amount(summary.period_total))),
        (
            "period_avg",
            Some(format!("{} / {days}d", format_amount(summary.period_avg))),
        ),
        (
            "last_period_avg",
            Some(format!(
                "{} / {days}d over {}",
                format_amount(summary.last_period_avg),
                summary.last_period
            )),
        ),
        ("goal", summary.goal.map(format_amount)),
    ];
    for (metric, value) in rows {
        table.push(vec![Some(metric.to_string()), value]);
    }
    table.write(format, out)
}

async fn report_daily<W: Write>(
    ledger: &LoadResult,
    name: &str,
    span: TimeSpan,
    today: NaiveDate,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let stats = CategoryStats::for_category(
        &ledger.operations,
        &ledger.categories,
        &ledger.rates,
        name,
        span,
        today,
    )
    .await
    .with_context(|| format!("failed to compute daily amounts for {name}"))?;

    let mut table = Table::new(["date", "amount", "cumulative"]);
    for ((date, amount), cumulative) in stats
        .dates()
        .into_iter()
        .zip(stats.amount_by_date())
        .zip(stats.cumulative_amount_by_dates())
    {
        table.push(vec![
            Some(date.to_string()),
            amount.map(format_amount),
            cumulative.map(format_amount),
        ]);
    }
    table.write(format, out)
}

async fn report_list<W: Write>(
    ledger: &LoadResult,
    args: &ListArgs,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let mut query = OperationQuery::load(&ledger.operations).await?;
    if args.from.is_some() || args.to.is_some() {
        let start = args.from.unwrap_or(NaiveDate::MIN);
        let end = args.to.unwrap_or(NaiveDate::MAX);
        query = query.time_span(&TimeSpan::new(start, end)?);
    }
    if !args.accounts.is_empty() {
        query = query.for_accounts(&args.accounts)?;
    }

    let mut table = Table::new([
        "date",
        "id",
        "type",
        "account",
        "amount",
        "currency",
        "categories",
    ]);
    let groups = query
        .group_by_date(SortDirection::Desc)
        .take(args.limit.unwrap_or(usize::MAX));
    for (date, operations) in groups {
        for op in operations {
            let account = match &op.body {
                OperationBody::Transfer(t) => format!("{} -> {}", t.account, t.to_account),
                _ => op.account().unwrap_or_default().to_string(),
            };
            let categories = op
                .splits()
                .iter()
                .map(|s| format!("{}:{}", s.category, format_amount(s.amount)))
                .collect::<Vec<_>>()
                .join(" ");
            table.push(vec![
                Some(date.to_string()),
                Some(op.id.clone()),
                Some(op.kind().to_string()),
                Some(account),
                Some(format_amount(op.amount())),
                op.currency().map(str::to_string),
                (!categories.is_empty()).then_some(categories),
            ]);
        }
    }
    table.write(format, out)
}

async fn rename<W: Write>(
    ledger: &LoadResult,
    file: &std::path::Path,
    old: &str,
    new: &str,
    format: OutputFormat,
    out: &mut W,
) -> Result<()> {
    let outcome = rename_category(&ledger.operations, &ledger.categories, old, new)
        .await
        .with_context(|| format!("failed to rename {old} to {new}"))?;
    finstat_loader::save(
        file,
        &ledger.options,
        &ledger.operations,
        &ledger.categories,
        &ledger.rates,
    )
    .with_context(|| format!("failed to save {}", file.display()))?;

    let mut table = Table::new(["old", "new", "operations", "splits", "merged"]);
    table.push(vec![
        Some(old.to_string()),
        Some(new.to_string()),
        Some(outcome.operations.to_string()),
        Some(outcome.splits.to_string()),
        Some(outcome.merged.to_string()),
    ]);
    table.write(format, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("finstat").chain(args.iter().copied())).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_span_defaults_to_current_month() {
        let span = SpanArgs::default().span(date(2024, 2, 10)).unwrap();
        assert_eq!(span.start(), date(2024, 2, 1));
        assert_eq!(span.end(), date(2024, 2, 29));

        let since = SpanArgs {
            from: Some(date(2024, 1, 15)),
            to: None,
        };
        assert_eq!(since.span(date(2024, 2, 10)).unwrap().end(), date(2024, 2, 10));

        let backwards = SpanArgs {
            from: Some(date(2024, 3, 1)),
            to: Some(date(2024, 2, 1)),
        };
        assert!(backwards.span(date(2024, 2, 10)).is_err());
    }

    #[test]
    fn test_totals_arguments() {
        let args = parse(&[
            "ledger.json",
            "--format",
            "csv",
            "totals",
            "-c",
            "Food",
            "-c",
            "Home",
            "--type",
            "expense",
            "--interval",
            "week",
            "--from",
            "2024-01-01",
        ]);
        assert_eq!(args.format, OutputFormat::Csv);
        let Command::Totals(totals) = &args.command else {
            panic!("expected totals, got {:?}", args.command);
        };
        assert_eq!(totals.categories, vec!["Food", "Home"]);
        assert_eq!(totals.types, vec![OperationKind::Expense]);
        assert_eq!(totals.interval, Some(Interval::Week));
        assert_eq!(totals.span.from, Some(date(2024, 1, 1)));

        let predicate = totals_predicate(totals).unwrap();
        let text = predicate.to_string();
        assert!(text.contains(r#"category = "Food""#));
        assert!(text.contains("type = expense"));
    }

    #[test]
    fn test_bad_filter_is_rejected() {
        let args = parse(&["ledger.json", "totals", "--filter", r#"{"kind": "category", "name": ""}"#]);
        let Command::Totals(totals) = &args.command else {
            panic!("expected totals");
        };
        assert!(totals_predicate(totals).is_err());

        let args = parse(&["ledger.json", "totals", "--filter", "not json"]);
        let Command::Totals(totals) = &args.command else {
            panic!("expected totals");
        };
        assert!(totals_predicate(totals).is_err());
    }

    #[test]
    fn test_category_arguments() {
        let args = parse(&["ledger.json", "--today", "2024-05-01", "category", "Food", "--last", "3m"]);
        assert_eq!(args.today, Some(date(2024, 5, 1)));
        let Command::Category(category) = &args.command else {
            panic!("expected category");
        };
        assert_eq!(category.last, Period::Months(3));
        assert_eq!(category.days, None);
    }

    #[test]
    fn test_unknown_type_is_a_usage_error() {
        let result = Args::try_parse_from(["finstat", "ledger.json", "totals", "--type", "refund"]);
        assert!(result.is_err());
    }
}
