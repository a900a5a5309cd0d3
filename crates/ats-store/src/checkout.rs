//! Checkout form validation and simulated order placement.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartItem, CartSummary};
use crate::error::CheckoutError;

pub const DEFAULT_COUNTRY: &str = "México";
const ORDER_PREFIX: &str = "LIQ";
const ORDER_SUFFIX_LEN: usize = 9;
const ORDER_SUFFIX_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid regex"));
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").expect("valid regex"));
static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}$").expect("valid regex"));
static CVV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3,4}$").expect("valid regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    PayPal,
    Transfer,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::PayPal => write!(f, "paypal"),
            PaymentMethod::Transfer => write!(f, "transfer"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "card" => Ok(PaymentMethod::Card),
            "paypal" => Ok(PaymentMethod::PayPal),
            "transfer" => Ok(PaymentMethod::Transfer),
            other => Err(format!(
                "unknown payment method '{other}'; expected card, paypal, or transfer"
            )),
        }
    }
}

/// Customer, shipping and payment details collected at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub payment_method: PaymentMethod,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub card_holder_name: String,
}

impl Default for CheckoutForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            country: DEFAULT_COUNTRY.to_owned(),
            payment_method: PaymentMethod::Card,
            card_number: String::new(),
            expiry_date: String::new(),
            cvv: String::new(),
            card_holder_name: String::new(),
        }
    }
}

impl CheckoutForm {
    /// Returns one message per invalid field, keyed by the field's form
    /// name. An empty map means the form is valid. Card fields are only
    /// checked for card payments.
    #[must_use]
    pub fn validate(&self) -> BTreeMap<&'static str, String> {
        let mut errors = BTreeMap::new();
        let mut fail = |field: &'static str, message: &str| {
            errors.insert(field, message.to_owned());
        };

        if is_blank(&self.first_name) {
            fail("firstName", "Nombre es requerido");
        }
        if is_blank(&self.last_name) {
            fail("lastName", "Apellido es requerido");
        }

        if is_blank(&self.email) {
            fail("email", "Email es requerido");
        } else if !EMAIL_RE.is_match(&self.email) {
            fail("email", "Email no es válido");
        }

        if is_blank(&self.phone) {
            fail("phone", "Teléfono es requerido");
        } else if self.phone.chars().filter(char::is_ascii_digit).count() != 10 {
            fail("phone", "Teléfono debe tener 10 dígitos");
        }

        if is_blank(&self.address) {
            fail("address", "Dirección es requerida");
        }
        if is_blank(&self.city) {
            fail("city", "Ciudad es requerida");
        }
        if is_blank(&self.state) {
            fail("state", "Estado es requerido");
        }

        if is_blank(&self.zip_code) {
            fail("zipCode", "Código postal es requerido");
        } else if !ZIP_RE.is_match(&self.zip_code) {
            fail("zipCode", "Código postal debe tener 5 dígitos");
        }

        if self.payment_method == PaymentMethod::Card {
            let card_digits: String = self
                .card_number
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if is_blank(&self.card_number) {
                fail("cardNumber", "Número de tarjeta es requerido");
            } else if card_digits.len() != 16 || !card_digits.chars().all(|c| c.is_ascii_digit()) {
                fail("cardNumber", "Número de tarjeta debe tener 16 dígitos");
            }

            if is_blank(&self.expiry_date) {
                fail("expiryDate", "Fecha de expiración es requerida");
            } else if !EXPIRY_RE.is_match(&self.expiry_date) {
                fail("expiryDate", "Formato debe ser MM/YY");
            }

            if is_blank(&self.cvv) {
                fail("cvv", "CVV es requerido");
            } else if !CVV_RE.is_match(&self.cvv) {
                fail("cvv", "CVV debe tener 3 o 4 dígitos");
            }

            if is_blank(&self.card_holder_name) {
                fail("cardHolderName", "Nombre del titular es requerido");
            }
        }

        errors
    }

    #[must_use]
    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    #[must_use]
    pub fn shipping_address(&self) -> String {
        format!(
            "{}, {}, {} {}, {}",
            self.address.trim(),
            self.city.trim(),
            self.state.trim(),
            self.zip_code.trim(),
            self.country.trim()
        )
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Groups the digits of `value` in blocks of four, e.g.
/// `"4111111111111111"` becomes `"4111 1111 1111 1111"`. Output is capped at
/// 19 characters.
#[must_use]
pub fn format_card_number(value: &str) -> String {
    let digits: Vec<char> = value.chars().filter(char::is_ascii_digit).collect();
    let mut out = String::with_capacity(19);
    for (i, chunk) in digits.chunks(4).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(chunk);
    }
    out.chars().take(19).collect()
}

/// Formats the digits of `value` as `MM/YY` once at least two are present.
#[must_use]
pub fn format_expiry(value: &str) -> String {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 2 {
        return digits;
    }
    let (month, rest) = digits.split_at(2);
    let year: String = rest.chars().take(2).collect();
    format!("{month}/{year}")
}

/// Confirmation of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
    pub placed_at: DateTime<Utc>,
    pub customer: String,
    pub email: String,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    pub items: Vec<CartItem>,
    pub summary: CartSummary,
}

/// Builds an order id of the form `LIQ-<unix millis>-<9 base-36 chars>`.
#[must_use]
pub fn generate_order_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| char::from(ORDER_SUFFIX_CHARSET[rng.random_range(0..ORDER_SUFFIX_CHARSET.len())]))
        .collect();
    format!("{ORDER_PREFIX}-{}-{suffix}", now.timestamp_millis())
}

/// Places an order for the current cart contents.
///
/// Payment is simulated: a valid form always succeeds. On success the cart
/// is cleared and the receipt carries a snapshot of its items and summary.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] when there is nothing to order and
/// [`CheckoutError::InvalidForm`] with the per-field messages when the form
/// does not validate. The cart is left untouched in both cases.
pub fn place_order(cart: &mut Cart, form: &CheckoutForm) -> Result<OrderReceipt, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(CheckoutError::InvalidForm(errors));
    }

    let placed_at = Utc::now();
    let receipt = OrderReceipt {
        order_id: generate_order_id(placed_at),
        placed_at,
        customer: form.customer_name(),
        email: form.email.trim().to_owned(),
        shipping_address: form.shipping_address(),
        payment_method: form.payment_method,
        items: cart.items().to_vec(),
        summary: cart.summary().clone(),
    };
    cart.clear_cart();

    tracing::info!(
        order_id = %receipt.order_id,
        items = receipt.summary.item_count,
        total = %receipt.summary.total,
        "order placed"
    );
    Ok(receipt)
}
