use std::error::Error;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use engine::{
    CategoryListFilter, CategoryType, CreateCategoryCmd, CreateTransactionCmd, Engine,
    LineDetailsInput, PageRequest, SummaryPeriod, TransactionListFilter, TransactionType,
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

mod settings;

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Record income and expenses and summarize them by period")]
struct Cli {
    /// Settings file (TOML). Defaults to `settings.toml` when present.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Override the configured time zone (IANA name).
    #[arg(long, global = true)]
    timezone: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations.
    Migrate,
    Category(Category),
    Transaction(Transaction),
    /// Income and expense totals with a daily or monthly breakdown.
    Summary(SummaryArgs),
}

#[derive(Args, Debug)]
struct Category {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    Add(CategoryAddArgs),
    List(CategoryListArgs),
}

#[derive(Args, Debug)]
struct CategoryAddArgs {
    #[arg(long)]
    name: String,
    /// COMMON, AGENCY or LINE. Repeat for several tags.
    #[arg(long = "type", value_parser = parse_category_type, required = true)]
    types: Vec<CategoryType>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    user_id: Option<i64>,
}

#[derive(Args, Debug)]
struct CategoryListArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long = "type", value_parser = parse_category_type)]
    kind: Option<CategoryType>,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args, Debug)]
struct Transaction {
    #[command(subcommand)]
    command: TransactionCommand,
}

#[derive(Subcommand, Debug)]
enum TransactionCommand {
    Add(TransactionAddArgs),
    List(TransactionListArgs),
    /// Show a transaction and its line details.
    Show { id: Uuid },
}

#[derive(Args, Debug)]
struct TransactionAddArgs {
    #[arg(long)]
    category: Uuid,
    #[arg(long)]
    description: String,
    /// INCOME or EXPENSE.
    #[arg(long = "type", value_parser = parse_transaction_type)]
    kind: TransactionType,
    /// Amount in major units. Ignored when line details are given.
    #[arg(long, allow_hyphen_values = true)]
    amount: Option<f64>,
    /// Outbound leg.
    #[arg(long, requires_all = ["back", "drive_change"])]
    go: Option<f64>,
    /// Return leg.
    #[arg(long = "return", requires_all = ["go", "drive_change"])]
    back: Option<f64>,
    #[arg(long, requires_all = ["go", "back"])]
    drive_change: Option<f64>,
    #[arg(long)]
    user_id: Option<i64>,
    /// Creation time (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    at: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
struct TransactionListArgs {
    #[arg(long)]
    user_id: Option<i64>,
    #[arg(long = "type", value_parser = parse_transaction_type)]
    kind: Option<TransactionType>,
    #[arg(long)]
    category: Option<Uuid>,
    #[arg(long, value_parser = parse_instant)]
    from: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_instant)]
    to: Option<DateTime<Utc>>,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = engine::DEFAULT_TAKE)]
    take: u64,
}

impl PageArgs {
    fn request(&self) -> Result<PageRequest, engine::EngineError> {
        PageRequest::new(self.page, self.take)
    }
}

#[derive(Args, Debug)]
struct SummaryArgs {
    /// last-30-days or twelve-months.
    #[arg(long, value_parser = parse_period)]
    period: SummaryPeriod,
    /// Reference instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,
}

fn parse_category_type(raw: &str) -> Result<CategoryType, String> {
    CategoryType::try_from(raw).map_err(|err| err.to_string())
}

fn parse_transaction_type(raw: &str) -> Result<TransactionType, String> {
    TransactionType::try_from(raw).map_err(|err| err.to_string())
}

fn parse_period(raw: &str) -> Result<SummaryPeriod, String> {
    raw.parse().map_err(|err: engine::EngineError| err.to_string())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| format!("invalid RFC 3339 timestamp {raw}: {err}"))
}

fn parse_timezone(raw: &str) -> Result<Tz, String> {
    if raw.trim().is_empty() {
        return Ok(Tz::UTC);
    }
    raw.trim()
        .parse::<Tz>()
        .map_err(|err| format!("invalid time zone {raw}: {err}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect_db(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let database = sea_orm::Database::connect(config.url()).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let timezone = parse_timezone(cli.timezone.as_deref().unwrap_or(&settings.timezone))?;
    let db = connect_db(&settings.database).await?;
    if let Command::Migrate = cli.command {
        tracing::info!("database is up to date");
        return Ok(());
    }

    let engine = Engine::builder()
        .database(db)
        .timezone(timezone)
        .build()
        .await?;

    match cli.command {
        Command::Migrate => {}
        Command::Category(Category {
            command: CategoryCommand::Add(args),
        }) => {
            let mut cmd = CreateCategoryCmd::new(args.name, args.types);
            if let Some(description) = args.description {
                cmd = cmd.description(description);
            }
            if let Some(user_id) = args.user_id {
                cmd = cmd.user_id(user_id);
            }
            print_json(&engine.create_category(cmd).await?)?;
        }
        Command::Category(Category {
            command: CategoryCommand::List(args),
        }) => {
            let filter = CategoryListFilter {
                name: args.name,
                kind: args.kind,
            };
            print_json(&engine.list_categories(&filter, args.page.request()?).await?)?;
        }
        Command::Transaction(Transaction {
            command: TransactionCommand::Add(args),
        }) => {
            let mut cmd = CreateTransactionCmd::new(args.category, args.description, args.kind);
            if let Some(amount) = args.amount {
                cmd = cmd.amount(amount);
            }
            if let (Some(go), Some(back), Some(change)) = (args.go, args.back, args.drive_change) {
                cmd = cmd.line_details(LineDetailsInput::new(go, back, change));
            }
            if let Some(user_id) = args.user_id {
                cmd = cmd.user_id(user_id);
            }
            if let Some(at) = args.at {
                cmd = cmd.created_at(at);
            }
            print_json(&engine.create_transaction(cmd).await?)?;
        }
        Command::Transaction(Transaction {
            command: TransactionCommand::List(args),
        }) => {
            let filter = TransactionListFilter {
                user_id: args.user_id,
                kind: args.kind,
                category_id: args.category,
                from: args.from,
                to: args.to,
            };
            print_json(&engine.list_transactions(&filter, args.page.request()?).await?)?;
        }
        Command::Transaction(Transaction {
            command: TransactionCommand::Show { id },
        }) => {
            let Some(transaction) = engine.transaction(id).await? else {
                eprintln!("transaction not found: {id}");
                std::process::exit(1);
            };
            let line_details = engine.line_details(id).await?;
            print_json(&serde_json::json!({
                "transaction": transaction,
                "line_details": line_details,
            }))?;
        }
        Command::Summary(args) => {
            let summary = match args.now {
                Some(now) => engine.summary_at(args.period, now).await?,
                None => engine.summary(args.period).await?,
            };
            print_json(&summary)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn blank_timezone_means_utc() {
        assert_eq!(parse_timezone("").unwrap(), Tz::UTC);
        assert_eq!(parse_timezone("   ").unwrap(), Tz::UTC);
        assert_eq!(
            parse_timezone(" America/Sao_Paulo ").unwrap(),
            Tz::America__Sao_Paulo
        );
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
        assert!(err.contains("invalid time zone Mars/Olympus_Mons"));
    }

    #[test]
    fn line_details_legs_go_together() {
        let category = Uuid::new_v4().to_string();
        let err = Cli::try_parse_from([
            "ledger",
            "transaction",
            "add",
            "--category",
            category.as_str(),
            "--description",
            "Linha 510",
            "--type",
            "EXPENSE",
            "--go",
            "12.5",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_summary_period_and_reference_instant() {
        let cli = Cli::try_parse_from([
            "ledger",
            "--timezone",
            "Europe/Rome",
            "summary",
            "--period",
            "twelve-months",
            "--now",
            "2025-06-15T12:00:00+02:00",
        ])
        .unwrap();

        assert_eq!(cli.timezone.as_deref(), Some("Europe/Rome"));
        let Command::Summary(args) = cli.command else {
            panic!("expected the summary command");
        };
        assert_eq!(args.period, SummaryPeriod::TwelveMonths);
        assert_eq!(args.now, Some(parse_instant("2025-06-15T10:00:00Z").unwrap()));
    }
}
