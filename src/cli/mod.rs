mod commands;
pub mod error;
mod utils;

#[cfg(test)]
mod utils_test;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{self, Config};
use crate::db::{
    Database, NewProduct, NewUser, Price, Session, SortOrder, SqliteDatabase, UserField,
    UserFilter, UserQuery,
};
use error::{CliError, CliResult};

#[derive(Parser)]
#[command(name = "shopdb")]
#[command(author, version, about = "Shop database CLI", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Database file (default: SHOPDB_DB_PATH or ~/.local/share/shopdb/shop.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (table or json)
    #[arg(long, global = true, default_value = "table")]
    pub format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Order management commands
    Order {
        #[command(subcommand)]
        command: OrderCommands,
    },
    /// Product catalogue commands
    Product {
        #[command(subcommand)]
        command: ProductCommands,
    },
    /// Aggregates and joined reads
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a user, or update the names of an existing one
    Add {
        /// External user ID
        id: i64,
        /// Full name
        full_name: String,
        /// Language code
        #[arg(long, default_value = "en")]
        lang: String,
        /// Username
        #[arg(long)]
        user_name: Option<String>,
        /// ID of the referring user
        #[arg(long)]
        referrer: Option<i64>,
    },
    /// Show a user
    Get {
        /// User ID
        id: i64,
    },
    /// List users
    List {
        /// Any of these language codes (comma-separated)
        #[arg(long)]
        lang: Option<String>,
        /// Case-insensitive username pattern, e.g. %john%
        #[arg(long)]
        name_like: Option<String>,
        /// Only users without a referrer
        #[arg(long)]
        no_referrer: bool,
        /// Sort field (id, full_name, user_name, language_code, created_at)
        #[arg(long)]
        sort: Option<String>,
        /// Sort order (asc or desc)
        #[arg(long)]
        order: Option<String>,
        /// Maximum number of users
        #[arg(long)]
        limit: Option<usize>,
        /// Number of users to skip
        #[arg(long)]
        offset: Option<usize>,
    },
    /// Set the referrer of a user (omit to clear it)
    SetReferrer {
        /// User ID
        id: i64,
        /// Referrer ID
        referrer: Option<i64>,
    },
    /// Delete a user and their orders
    Delete {
        /// User ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum OrderCommands {
    /// Create an empty order
    Create {
        /// Owning user ID
        user_id: i64,
    },
    /// Add a product line to an order
    AddLine {
        order_id: i64,
        product_id: i64,
        quantity: i64,
    },
    /// Show an order with its lines
    Show {
        /// Order ID
        order_id: i64,
    },
    /// Delete an order and its lines
    Delete {
        /// Order ID
        order_id: i64,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Add a product
    Add {
        title: String,
        /// Price with up to four decimals
        price: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Import products from a JSON array file in one transaction
    Import {
        /// Path to the JSON file
        path: PathBuf,
    },
    /// List products
    List,
    /// Delete a product that no order references
    Delete {
        /// Product ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Order count per user
    Orders,
    /// Ordered quantity per user
    Quantities {
        /// Only totals strictly greater than this
        #[arg(long)]
        min: Option<i64>,
    },
    /// Every purchased line of a user
    Lines {
        /// User ID
        user_id: i64,
        /// Load with one query per row instead of a join
        #[arg(long)]
        per_row: bool,
    },
    /// Referrer and referral pairs
    Referrals,
    /// Users with their orders and lines
    Tree,
}

/// Initialize tracing subscriber with env filter, logging to stderr
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopdb=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn build_user_query(
    lang: Option<&str>,
    name_like: Option<String>,
    no_referrer: bool,
    sort: Option<String>,
    order: Option<&str>,
    limit: Option<usize>,
    offset: Option<usize>,
) -> CliResult<UserQuery> {
    let mut query = UserQuery::new();

    let languages = utils::parse_list(lang);
    if !languages.is_empty() {
        query = query.filter(UserFilter::any(
            languages
                .into_iter()
                .map(|l| UserFilter::eq(UserField::LanguageCode, l)),
        ));
    }
    if let Some(pattern) = name_like {
        query = query.filter(UserFilter::like(UserField::UserName, pattern));
    }
    if no_referrer {
        query = query.filter(UserFilter::IsNull(UserField::ReferrerId));
    }

    query.page.sort_by = sort;
    query.page.sort_order = order
        .map(|o| o.parse::<SortOrder>())
        .transpose()
        .map_err(|message| CliError::InvalidInput { message })?;
    query.page.limit = limit;
    query.page.offset = offset;

    Ok(query)
}

async fn execute<S: Session>(session: &mut S, command: Commands, format: &str) -> CliResult<String> {
    match command {
        Commands::User { command } => match command {
            UserCommands::Add {
                id,
                full_name,
                lang,
                user_name,
                referrer,
            } => {
                let user = NewUser {
                    id,
                    full_name,
                    language_code: lang,
                    user_name,
                    referrer_id: referrer,
                };
                commands::user::add_user(session, &user).await
            }
            UserCommands::Get { id } => commands::user::get_user(session, id, format).await,
            UserCommands::List {
                lang,
                name_like,
                no_referrer,
                sort,
                order,
                limit,
                offset,
            } => {
                let query = build_user_query(
                    lang.as_deref(),
                    name_like,
                    no_referrer,
                    sort,
                    order.as_deref(),
                    limit,
                    offset,
                )?;
                commands::user::list_users(session, &query, format).await
            }
            UserCommands::SetReferrer { id, referrer } => {
                commands::user::set_referrer(session, id, referrer).await
            }
            UserCommands::Delete { id } => commands::user::delete_user(session, id).await,
        },
        Commands::Order { command } => match command {
            OrderCommands::Create { user_id } => {
                commands::order::create_order(session, user_id).await
            }
            OrderCommands::AddLine {
                order_id,
                product_id,
                quantity,
            } => commands::order::add_line(session, order_id, product_id, quantity).await,
            OrderCommands::Show { order_id } => {
                commands::order::show_order(session, order_id, format).await
            }
            OrderCommands::Delete { order_id } => {
                commands::order::delete_order(session, order_id).await
            }
        },
        Commands::Product { command } => match command {
            ProductCommands::Add {
                title,
                price,
                description,
            } => {
                let product = NewProduct {
                    title,
                    description,
                    price: price.parse::<Price>()?,
                };
                commands::product::add_product(session, &product).await
            }
            ProductCommands::Import { path } => {
                commands::product::import_products(session, &path, format).await
            }
            ProductCommands::List => commands::product::list_products(session, format).await,
            ProductCommands::Delete { id } => {
                commands::product::delete_product(session, id).await
            }
        },
        Commands::Report { command } => match command {
            ReportCommands::Orders => commands::report::order_counts(session, format).await,
            ReportCommands::Quantities { min } => {
                commands::report::quantity_totals(session, min, format).await
            }
            ReportCommands::Lines { user_id, per_row } => {
                commands::report::user_lines(session, user_id, per_row, format).await
            }
            ReportCommands::Referrals => commands::report::referrals(session, format).await,
            ReportCommands::Tree => commands::report::order_tree(session, format).await,
        },
    }
}

pub async fn run() -> CliResult<()> {
    config::load_dotenv();
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = &cli.db {
        config = config.with_db_path(path);
    }

    let db = SqliteDatabase::connect(&config).await?;
    let applied = db.migrate().await?;
    debug!(applied, "startup migrations");

    let mut session = db.session().await?;
    let result = execute(&mut session, cli.command, &cli.format).await;
    drop(session);
    db.close().await;

    println!("{}", result?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shopdb",
            "report",
            "quantities",
            "--min",
            "3",
            "--format",
            "json",
            "--db",
            "/tmp/x.db",
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(
            cli.command,
            Commands::Report {
                command: ReportCommands::Quantities { min: Some(3) }
            }
        ));
    }

    #[test]
    fn test_set_referrer_without_value_clears() {
        let cli = Cli::try_parse_from(["shopdb", "user", "set-referrer", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::User {
                command: UserCommands::SetReferrer {
                    id: 5,
                    referrer: None
                }
            }
        ));
    }

    #[test]
    fn test_build_user_query() {
        let query = build_user_query(
            Some("en,uk"),
            Some("%john%".to_string()),
            true,
            Some("full_name".to_string()),
            Some("DESC"),
            Some(10),
            None,
        )
        .unwrap();

        assert_eq!(query.filters.len(), 3);
        assert_eq!(
            query.filters[0],
            UserFilter::any([
                UserFilter::eq(UserField::LanguageCode, "en"),
                UserFilter::eq(UserField::LanguageCode, "uk"),
            ])
        );
        assert_eq!(query.page.sort_order, Some(SortOrder::Desc));
        assert_eq!(query.page.limit, Some(10));
    }

    #[test]
    fn test_build_user_query_rejects_bad_order() {
        let result = build_user_query(None, None, false, None, Some("sideways"), None, None);
        assert!(matches!(result, Err(CliError::InvalidInput { .. })));
    }
}
