use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use storefront::api::orders::DeliveryDetails;
use storefront::api::products::ProductQuery;
use storefront::api::{ApiError, cart, orders, products};
use storefront::config::ConfigError;
use storefront::net::{GatewayError, LoginError, TransportError};
use storefront::session::SessionError;
use storefront::{ClientConfig, FileSessionStore, Gateway, Method, Navigation, RequestOptions, SessionStatus};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("session file: {0}")]
    Session(#[from] SessionError),
    #[error("http client: {0}")]
    Transport(#[from] TransportError),
    #[error("login failed: {0}")]
    Login(#[from] LoginError),
    #[error("request failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("`{path}` requires login; run `storefront login` first")]
    LoginRequired { path: String },
    #[error("session expired; please log in again")]
    SessionExpired,
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
}

#[derive(Parser, Debug)]
#[command(name = "storefront", about = "Storefront API client with persistent login")]
struct Cli {
    /// Overrides `STOREFRONT_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `STOREFRONT_SESSION_FILE`.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

struct CliContext {
    gateway: Gateway,
    session_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        username: String,
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Status,
    /// Show whether a view path would render or redirect.
    Route {
        path: String,
    },
    Products(ProductsCommand),
    Cart(CartCommand),
    Orders(OrdersCommand),
    /// Send an arbitrary authenticated request and print the body.
    Request {
        method: String,
        path: String,
        #[arg(long)]
        data: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ProductsCommand {
    #[command(subcommand)]
    command: ProductsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProductsSubcommand {
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = products::DEFAULT_MIN_PRICE)]
        min_price: u64,
        #[arg(long, default_value_t = products::DEFAULT_MAX_PRICE)]
        max_price: u64,
        #[arg(long)]
        ordering: Option<String>,
    },
    Show {
        id: u64,
    },
    Suggest {
        query: String,
    },
}

#[derive(Args, Debug)]
struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Subcommand, Debug)]
enum CartSubcommand {
    Show,
    Set {
        product_id: u64,
        quantity: u32,
    },
    Remove {
        item_id: u64,
    },
}

#[derive(Args, Debug)]
struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Subcommand, Debug)]
enum OrdersSubcommand {
    List,
    Place {
        #[arg(long)]
        email: String,
        #[arg(long)]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let dotenv = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    if let Err(error) = dotenv {
        tracing::debug!(%error, "no .env loaded");
    }

    let cli = Cli::parse();
    let ctx = build_context(cli.base_url, cli.session_file)?;

    match cli.command {
        Command::Login { username, password } => run_login(&ctx, &username, &password).await,
        Command::Logout => run_logout(&ctx),
        Command::Status => run_status(&ctx),
        Command::Route { path } => run_route(&ctx, &path),
        Command::Products(cmd) => run_products(&ctx, cmd).await,
        Command::Cart(cmd) => run_cart(&ctx, cmd).await,
        Command::Orders(cmd) => run_orders(&ctx, cmd).await,
        Command::Request { method, path, data } => run_request(&ctx, &method, &path, data).await,
    }
}

fn build_context(base_url: Option<String>, session_file: Option<PathBuf>) -> Result<CliContext, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = base_url {
        config.api_base_url = storefront::config::normalize_base_url(&url)?;
    }
    if let Some(path) = session_file {
        config.session_file = path;
    }
    let store = Arc::new(FileSessionStore::open(&config.session_file)?);
    let gateway = Gateway::from_config(&config, store)?;
    tracing::debug!(base_url = %config.api_base_url, session_file = %config.session_file.display(), "client ready");
    Ok(CliContext { gateway, session_file: config.session_file })
}

// =============================================================================
// SESSION
// =============================================================================

async fn run_login(ctx: &CliContext, username: &str, password: &str) -> Result<(), CliError> {
    ctx.gateway.login(username, password).await?;
    println!("logged in as {username}");
    Ok(())
}

fn run_logout(ctx: &CliContext) -> Result<(), CliError> {
    ctx.gateway.logout()?;
    println!("logged out");
    Ok(())
}

fn run_status(ctx: &CliContext) -> Result<(), CliError> {
    print_json(&serde_json::json!({
        "status": status_label(ctx.gateway.status()),
        "base_url": ctx.gateway.base_url(),
        "session_file": ctx.session_file.display().to_string(),
    }))
}

fn run_route(ctx: &CliContext, path: &str) -> Result<(), CliError> {
    match ctx.gateway.guard().check(path) {
        Navigation::Render => println!("render {path}"),
        Navigation::Redirect { to } => println!("redirect {path} -> {to}"),
    }
    Ok(())
}

fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Anonymous => "anonymous",
        SessionStatus::Active => "active",
        SessionStatus::Expired => "expired",
        SessionStatus::LoggedOut => "logged_out",
    }
}

/// Refuse to call a protected endpoint the guard would not render.
fn require_route(ctx: &CliContext, path: &str) -> Result<(), CliError> {
    match ctx.gateway.guard().check(path) {
        Navigation::Render => Ok(()),
        Navigation::Redirect { .. } => Err(CliError::LoginRequired { path: path.to_owned() }),
    }
}

/// A 401 that survived the refresh attempt means the session is gone.
fn api_failure(ctx: &CliContext, error: ApiError) -> CliError {
    if error.is_unauthorized() && ctx.gateway.status() == SessionStatus::Expired {
        CliError::SessionExpired
    } else {
        CliError::Api(error)
    }
}

// =============================================================================
// CATALOGUE / CART / ORDERS
// =============================================================================

async fn run_products(ctx: &CliContext, cmd: ProductsCommand) -> Result<(), CliError> {
    require_route(ctx, "/products")?;
    match cmd.command {
        ProductsSubcommand::List { category, search, min_price, max_price, ordering } => {
            let query = ProductQuery { category, search, min_price, max_price, ordering };
            let items = products::list_products(&ctx.gateway, &query)
                .await
                .map_err(|e| api_failure(ctx, e))?;
            print_json(&items)
        }
        ProductsSubcommand::Show { id } => {
            let product = products::get_product(&ctx.gateway, id)
                .await
                .map_err(|e| api_failure(ctx, e))?;
            print_json(&product)
        }
        ProductsSubcommand::Suggest { query } => {
            let suggestions = products::search_suggestions(&ctx.gateway, &query)
                .await
                .map_err(|e| api_failure(ctx, e))?;
            print_json(&suggestions)
        }
    }
}

async fn run_cart(ctx: &CliContext, cmd: CartCommand) -> Result<(), CliError> {
    require_route(ctx, "/cart")?;
    match cmd.command {
        CartSubcommand::Show => {
            let current = cart::get_cart(&ctx.gateway).await.map_err(|e| api_failure(ctx, e))?;
            print_json(&current)
        }
        CartSubcommand::Set { product_id, quantity } => {
            cart::set_cart_item(&ctx.gateway, product_id, quantity)
                .await
                .map_err(|e| api_failure(ctx, e))?;
            println!("cart updated");
            Ok(())
        }
        CartSubcommand::Remove { item_id } => {
            cart::remove_cart_item(&ctx.gateway, item_id)
                .await
                .map_err(|e| api_failure(ctx, e))?;
            println!("removed item {item_id}");
            Ok(())
        }
    }
}

async fn run_orders(ctx: &CliContext, cmd: OrdersCommand) -> Result<(), CliError> {
    require_route(ctx, "/orders")?;
    match cmd.command {
        OrdersSubcommand::List => {
            let history = orders::list_orders(&ctx.gateway).await.map_err(|e| api_failure(ctx, e))?;
            print_json(&history)
        }
        OrdersSubcommand::Place { email, address } => {
            let delivery = DeliveryDetails { email, address };
            let confirmation = orders::place_order(&ctx.gateway, &delivery)
                .await
                .map_err(|e| api_failure(ctx, e))?;
            print_json(&confirmation)
        }
    }
}

// =============================================================================
// RAW REQUEST
// =============================================================================

async fn run_request(ctx: &CliContext, method: &str, path: &str, data: Option<String>) -> Result<(), CliError> {
    let method = parse_method(method)?;
    let mut opts = RequestOptions::new(method);
    if let Some(data) = data {
        let body = serde_json::from_str::<Value>(&data)?;
        opts = opts.json(&body)?;
    }

    let response = ctx.gateway.request(path, opts).await?;
    if response.is_unauthorized() && ctx.gateway.status() == SessionStatus::Expired {
        return Err(CliError::SessionExpired);
    }
    if !response.is_success() {
        return Err(CliError::ServerError {
            status: response.status,
            message: response.error_message().unwrap_or_else(|| response.text()),
        });
    }
    if response.body.is_empty() {
        return Ok(());
    }
    match response.json::<Value>() {
        Ok(json) => print_json(&json),
        Err(_) => {
            println!("{}", response.text());
            Ok(())
        }
    }
}

fn parse_method(raw: &str) -> Result<Method, CliError> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(CliError::InvalidMethod(raw.to_owned()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| CliError::InvalidMethod(raw.to_owned()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
