use super::*;

#[test]
fn parse_method_accepts_any_case() {
    assert_eq!(parse_method("get").unwrap(), Method::GET);
    assert_eq!(parse_method(" Delete ").unwrap(), Method::DELETE);
}

#[test]
fn parse_method_rejects_garbage() {
    assert!(matches!(parse_method(""), Err(CliError::InvalidMethod(_))));
    assert!(matches!(parse_method("NOT A VERB"), Err(CliError::InvalidMethod(_))));
}

#[test]
fn status_labels_are_stable() {
    assert_eq!(status_label(SessionStatus::Anonymous), "anonymous");
    assert_eq!(status_label(SessionStatus::Expired), "expired");
    assert_eq!(status_label(SessionStatus::LoggedOut), "logged_out");
}

#[test]
fn expired_message_tells_user_to_log_in() {
    assert_eq!(CliError::SessionExpired.to_string(), "session expired; please log in again");
}

#[test]
fn cli_parses_nested_subcommands() {
    let cli = Cli::try_parse_from(["storefront", "--base-url", "http://shop.test/api", "cart", "set", "4", "2"]).unwrap();
    assert_eq!(cli.base_url.as_deref(), Some("http://shop.test/api"));
    assert!(matches!(
        cli.command,
        Command::Cart(CartCommand { command: CartSubcommand::Set { product_id: 4, quantity: 2 } })
    ));
}

#[test]
fn products_list_defaults_price_bounds() {
    let cli = Cli::try_parse_from(["storefront", "products", "list", "--search", "lamp"]).unwrap();
    let Command::Products(ProductsCommand { command: ProductsSubcommand::List { min_price, max_price, search, .. } }) =
        cli.command
    else {
        panic!("expected products list");
    };
    assert_eq!((min_price, max_price), (0, 100_000));
    assert_eq!(search.as_deref(), Some("lamp"));
}
