use std::str::FromStr;

use ats_store::{MemoryStore, PaymentMethod};
use rust_decimal::Decimal;

use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["ats-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_categories_with_limit() {
    let cli = Cli::try_parse_from(["ats-cli", "categories", "--limit", "5"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Categories { limit: Some(5) })
    ));
}

#[test]
fn parses_browse_with_filters() {
    let cli = Cli::try_parse_from([
        "ats-cli",
        "browse",
        "WHISKY",
        "--pages",
        "3",
        "--subcategory",
        "Escocés",
        "--subcategory",
        "Bourbon",
        "--in-stock",
        "--max-price",
        "750.50",
    ])
    .unwrap();

    let Some(Commands::Browse {
        category,
        pages,
        filters,
    }) = cli.command
    else {
        panic!("expected browse command");
    };
    assert_eq!(category, "WHISKY");
    assert_eq!(pages, 3);
    assert_eq!(filters.subcategories, vec!["Escocés", "Bourbon"]);
    assert!(filters.in_stock);
    assert_eq!(filters.max_price, Some(Decimal::new(75050, 2)));
    assert!(filters.min_price.is_none());
}

#[test]
fn browse_rejects_conflicting_stock_flags() {
    let result = Cli::try_parse_from(["ats-cli", "browse", "RON", "--in-stock", "--out-of-stock"]);
    assert!(result.is_err());
}

#[test]
fn single_price_bound_keeps_saved_other_bound() {
    let args = catalog::FilterArgs {
        min_price: Some(Decimal::from(200)),
        ..catalog::FilterArgs::default()
    };
    let current = ats_store::ActiveFilters {
        price_range: (Decimal::from(100), Decimal::from(900)),
        ..ats_store::ActiveFilters::default()
    };

    let updates = args.updates(&current);
    assert_eq!(
        updates,
        vec![ats_store::FilterUpdate::PriceRange(
            Decimal::from(200),
            Decimal::from(900)
        )]
    );
}

#[test]
fn no_filter_flags_means_no_updates() {
    let args = catalog::FilterArgs::default();
    assert!(args.updates(&ats_store::ActiveFilters::default()).is_empty());
}

#[test]
fn parses_search_without_query_as_history() {
    let cli = Cli::try_parse_from(["ats-cli", "search", "--clear-history"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Search {
            query: None,
            limit: 20,
            clear_history: true
        })
    ));
}

#[test]
fn product_needs_id_or_sku() {
    assert!(Cli::try_parse_from(["ats-cli", "product"]).is_err());
    assert!(Cli::try_parse_from(["ats-cli", "product", "7", "--sku", "X"]).is_err());

    let cli = Cli::try_parse_from(["ats-cli", "product", "--sku", "WHI-750"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Product { id: None, sku: Some(ref s) }) if s == "WHI-750"
    ));
}

#[test]
fn parses_related_defaults() {
    let cli = Cli::try_parse_from(["ats-cli", "related", "42"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Related {
            id: 42,
            max: 8,
            with_brand: false
        })
    ));
}

#[test]
fn parses_cart_add_with_quantity() {
    let cli = Cli::try_parse_from(["ats-cli", "cart", "add", "12", "-q", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Cart {
            command: cart::CartCommands::Add {
                id: 12,
                quantity: 3
            }
        })
    ));
}

#[test]
fn cart_add_rejects_non_positive_quantity() {
    assert!(Cli::try_parse_from(["ats-cli", "cart", "add", "12", "-q", "0"]).is_err());
    assert!(Cli::try_parse_from(["ats-cli", "cart", "add", "12", "--quantity=-2"]).is_err());
}

#[tokio::test]
async fn cart_add_with_zero_quantity_fails_before_fetching() {
    // Nothing listens on the discard port; the guard must fail first.
    let client = ApiClient::new("http://127.0.0.1:9", 1, "ats-test", 0, 0).unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut cart = ats_store::Cart::with_store(ats_store::CartConfig::default(), store);

    let err = cart::run_cart_add(&client, &mut cart, 12, 0).await.unwrap_err();
    assert!(err.to_string().contains("at least 1"), "{err}");
    assert!(cart.is_empty());
}

#[test]
fn parses_cart_set_and_export() {
    let cli = Cli::try_parse_from(["ats-cli", "cart", "set", "12", "0"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Cart {
            command: cart::CartCommands::Set {
                id: 12,
                quantity: 0
            }
        })
    ));

    let cli = Cli::try_parse_from(["ats-cli", "cart", "export", "-o", "cart.json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Cart {
            command: cart::CartCommands::Export { output: Some(_) }
        })
    ));
}

#[test]
fn checkout_builds_formatted_form() {
    let cli = Cli::try_parse_from([
        "ats-cli",
        "checkout",
        "--first-name",
        "Ana",
        "--last-name",
        "Pérez",
        "--email",
        "ana@example.com",
        "--phone",
        "55 1234 5678",
        "--address",
        "Av. Reforma 100",
        "--city",
        "CDMX",
        "--state",
        "CDMX",
        "--zip",
        "06600",
        "--card-number",
        "4111111111111111",
        "--expiry",
        "1228",
        "--cvv",
        "123",
        "--card-holder",
        "ANA PEREZ",
    ])
    .unwrap();
    let Some(Commands::Checkout(args)) = cli.command else {
        panic!("expected checkout command");
    };

    let form = args.into_form();
    assert_eq!(form.card_number, "4111 1111 1111 1111");
    assert_eq!(form.expiry_date, "12/28");
    assert_eq!(form.country, "México");
    assert_eq!(form.payment_method, PaymentMethod::Card);
    assert!(form.validate().is_empty(), "{:?}", form.validate());
}

#[test]
fn checkout_rejects_unknown_payment_method() {
    assert!(PaymentMethod::from_str("bitcoin").is_err());
    let result = Cli::try_parse_from([
        "ats-cli",
        "checkout",
        "--first-name",
        "A",
        "--last-name",
        "B",
        "--email",
        "a@b.co",
        "--phone",
        "5512345678",
        "--address",
        "x",
        "--city",
        "y",
        "--state",
        "z",
        "--zip",
        "06600",
        "--payment",
        "bitcoin",
    ]);
    assert!(result.is_err());
}

#[test]
fn checkout_with_empty_cart_fails() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut cart = ats_store::Cart::with_store(ats_store::CartConfig::default(), store);
    let args = cart::CheckoutArgs {
        payment: PaymentMethod::Transfer,
        ..cart::CheckoutArgs::default()
    };
    assert!(cart::run_checkout(&mut cart, args).is_err());
}

#[test]
fn cart_commands_edit_persisted_cart() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let product = ats_core::Product {
        id: 5,
        name: "Ron Añejo".to_owned(),
        base_price: Decimal::from(300),
        stock: "Con Stock".to_owned(),
        ..ats_core::Product::default()
    };
    {
        let mut cart =
            ats_store::Cart::with_store(ats_store::CartConfig::default(), Arc::clone(&store));
        cart.add_item(&product, 2);
    }

    let mut cart = ats_store::Cart::with_store(ats_store::CartConfig::default(), Arc::clone(&store));
    cart::run_cart_command(&mut cart, cart::CartCommands::Set { id: 5, quantity: 4 }).unwrap();
    assert_eq!(cart.item_quantity(5), 4);

    assert!(cart::run_cart_command(&mut cart, cart::CartCommands::Remove { id: 99 }).is_err());

    cart::run_cart_command(&mut cart, cart::CartCommands::Clear).unwrap();
    let reloaded = ats_store::Cart::with_store(ats_store::CartConfig::default(), store);
    assert!(reloaded.is_empty());
}
