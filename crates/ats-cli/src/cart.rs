//! Cart and checkout command handlers.
//!
//! The cart lives in the local store, so every command opens it, applies
//! one change and lets the cart persist itself.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ats_client::ApiClient;
use ats_core::AppConfig;
use ats_store::checkout::{format_card_number, format_expiry};
use ats_store::{
    place_order, Cart, CartConfig, CheckoutError, CheckoutForm, KeyValueStore, PaymentMethod,
};
use clap::{Args, Subcommand};

use crate::catalog::fmt_money;

/// Sub-commands available under `cart`.
#[derive(Debug, Subcommand)]
pub enum CartCommands {
    /// Show cart contents and totals
    Show,
    /// Add a product by id
    Add {
        id: i64,
        #[arg(long, short, default_value = "1", value_parser = clap::value_parser!(i64).range(1..))]
        quantity: i64,
    },
    /// Remove a product from the cart
    Remove { id: i64 },
    /// Set a line's quantity; 0 removes the line
    Set { id: i64, quantity: i64 },
    /// Empty the cart
    Clear,
    /// Print the cart as JSON, or write it to a file
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace the cart with a previously exported one
    Import { path: PathBuf },
}

/// Customer details for `checkout`.
#[derive(Debug, Default, Args)]
pub struct CheckoutArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub email: String,
    /// 10-digit phone number
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub address: String,
    #[arg(long)]
    pub city: String,
    #[arg(long)]
    pub state: String,
    /// 5-digit postal code
    #[arg(long)]
    pub zip: String,
    /// Defaults to México
    #[arg(long)]
    pub country: Option<String>,
    /// card, paypal or transfer
    #[arg(long, default_value = "card")]
    pub payment: PaymentMethod,
    #[arg(long, default_value = "")]
    pub card_number: String,
    /// Card expiry as MM/YY
    #[arg(long, default_value = "")]
    pub expiry: String,
    #[arg(long, default_value = "")]
    pub cvv: String,
    #[arg(long, default_value = "")]
    pub card_holder: String,
}

impl CheckoutArgs {
    pub(crate) fn into_form(self) -> CheckoutForm {
        let defaults = CheckoutForm::default();
        CheckoutForm {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            city: self.city,
            state: self.state,
            zip_code: self.zip,
            country: self.country.unwrap_or(defaults.country),
            payment_method: self.payment,
            card_number: format_card_number(&self.card_number),
            expiry_date: format_expiry(&self.expiry),
            cvv: self.cvv,
            card_holder_name: self.card_holder,
        }
    }
}

pub(crate) fn open_cart(config: &AppConfig, store: &Arc<dyn KeyValueStore>) -> Cart {
    Cart::with_store(CartConfig::from_app_config(config), Arc::clone(store))
}

/// Fetch product `id` and add `quantity` of it to the cart.
///
/// # Errors
///
/// Returns an error if `quantity` is not positive, or if the product cannot
/// be fetched, is out of stock, or is already at the per-item limit.
pub(crate) async fn run_cart_add(
    client: &ApiClient,
    cart: &mut Cart,
    id: i64,
    quantity: i64,
) -> anyhow::Result<()> {
    if quantity < 1 {
        anyhow::bail!("quantity must be at least 1, got {quantity}");
    }
    let product = client.product_by_id(id).await?;
    if !product.is_in_stock() {
        anyhow::bail!("'{}' is out of stock", product.name);
    }
    if !cart.can_add_more(id) {
        anyhow::bail!(
            "'{}' is already at the limit of {} per order",
            product.name,
            cart.config().max_quantity_per_item
        );
    }

    cart.add_item(&product, quantity);
    println!(
        "added '{}' ({} now in cart)",
        product.name,
        cart.item_quantity(id)
    );
    print_totals(cart);
    Ok(())
}

/// Apply a cart command that needs no network access.
///
/// # Errors
///
/// Returns an error if an export or import file cannot be written or read,
/// or the imported file is not an exported cart.
pub(crate) fn run_cart_command(cart: &mut Cart, command: CartCommands) -> anyhow::Result<()> {
    match command {
        CartCommands::Show => print_cart(cart),
        CartCommands::Add { .. } => anyhow::bail!("adding to the cart needs the product API"),
        CartCommands::Remove { id } => {
            if !cart.is_in_cart(id) {
                anyhow::bail!("product {id} is not in the cart");
            }
            cart.remove_item(id);
            println!("removed product {id}");
            print_totals(cart);
        }
        CartCommands::Set { id, quantity } => {
            if !cart.is_in_cart(id) {
                anyhow::bail!("product {id} is not in the cart; use `cart add` first");
            }
            cart.update_quantity(id, quantity);
            println!("product {id}: {} in cart", cart.item_quantity(id));
            print_totals(cart);
        }
        CartCommands::Clear => {
            cart.clear_cart();
            println!("cart cleared");
        }
        CartCommands::Export { output } => {
            let json = cart.export_cart()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("cart exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        CartCommands::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            if !cart.import_cart(&json) {
                anyhow::bail!("{} is not an exported cart", path.display());
            }
            println!("imported {} item(s)", cart.items().len());
            print_totals(cart);
        }
    }
    Ok(())
}

/// Place an order for the current cart.
///
/// # Errors
///
/// Returns an error if the cart is empty or the form does not validate;
/// each invalid field is printed to stderr first.
pub(crate) fn run_checkout(cart: &mut Cart, args: CheckoutArgs) -> anyhow::Result<()> {
    let form = args.into_form();
    let receipt = match place_order(cart, &form) {
        Ok(receipt) => receipt,
        Err(CheckoutError::InvalidForm(errors)) => {
            for (field, message) in &errors {
                eprintln!("  {field}: {message}");
            }
            anyhow::bail!("checkout form has {} invalid field(s)", errors.len());
        }
        Err(e) => return Err(e.into()),
    };

    println!("order {} placed", receipt.order_id);
    println!("Customer: {} <{}>", receipt.customer, receipt.email);
    println!("Ship to:  {}", receipt.shipping_address);
    println!("Payment:  {}", receipt.payment_method);
    println!("Date:     {}", receipt.placed_at.format("%Y-%m-%d %H:%M UTC"));
    println!();
    for item in &receipt.items {
        println!(
            "{:>4} x {:<40}{:>12}",
            item.quantity,
            item.name,
            fmt_money(item.line_total())
        );
    }
    println!("{:<46}{:>12}", "Total", fmt_money(receipt.summary.total));
    Ok(())
}

fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("the cart is empty");
        return;
    }
    println!(
        "{:<8}{:<40}{:>5}{:>12}{:>12}",
        "ID", "NAME", "QTY", "UNIT", "TOTAL"
    );
    for item in cart.items() {
        println!(
            "{:<8}{:<40}{:>5}{:>12}{:>12}",
            item.id,
            item.name,
            item.quantity,
            fmt_money(item.unit_price),
            fmt_money(item.line_total())
        );
    }
    println!();
    print_totals(cart);
    println!("Weight:   {:.1} kg", cart.weight());
}

fn print_totals(cart: &Cart) {
    let summary = cart.summary();
    let shipping = if summary.shipping.is_zero() {
        "free".to_string()
    } else {
        fmt_money(summary.shipping)
    };
    println!(
        "Items:    {} ({} product(s))",
        summary.item_count, summary.unique_item_count
    );
    println!("Subtotal: {}", fmt_money(summary.subtotal));
    println!(
        "Tax:      {} ({}%)",
        fmt_money(summary.tax),
        (summary.tax_rate * rust_decimal::Decimal::ONE_HUNDRED).normalize()
    );
    println!("Shipping: {shipping}");
    if !summary.discount.is_zero() {
        println!("Discount: -{}", fmt_money(summary.discount));
    }
    println!("Total:    {}", fmt_money(summary.total));
}
