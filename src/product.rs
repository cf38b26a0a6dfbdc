use async_graphql::{ComplexObject, Enum, SimpleObject};
use tracing::warn;

use crate::outbound::RawProduct;

const CONDITION_NEW: &str = "new";
const CURRENCY_PREFIX: &str = "R$ ";

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Condition {
    New,
    Used,
}

impl Condition {
    pub(crate) const ALL: [Condition; 2] = [Condition::New, Condition::Used];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::New => "Novo",
            Self::Used => "Usado",
        }
    }
}

impl From<Option<&str>> for Condition {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(CONDITION_NEW) => Self::New,
            _ => Self::Used,
        }
    }
}

/// A search result reduced to what the dashboard shows.
#[derive(SimpleObject, Debug, Clone, PartialEq)]
#[graphql(complex)]
pub(crate) struct DisplayRecord {
    pub(crate) name: String,
    pub(crate) price: f64,
    pub(crate) link: String,
    pub(crate) condition: Condition,
    pub(crate) free_shipping: bool,
    pub(crate) sold_count: i64,
    pub(crate) formatted_price: String,
}

#[ComplexObject]
impl DisplayRecord {
    /// "Novo" or "Usado".
    async fn condition_label(&self) -> String {
        self.condition.label().to_string()
    }

    /// "Sim" or "Não".
    async fn free_shipping_label(&self) -> String {
        self.free_shipping_label_str().to_string()
    }
}

impl DisplayRecord {
    /// Returns `None` when the product has no usable price.
    pub(crate) fn from_raw(product: &RawProduct) -> Option<Self> {
        let price = product.price.filter(|p| p.is_finite())?;
        Some(Self {
            name: product.title.clone().unwrap_or_default(),
            price,
            link: product.permalink.clone().unwrap_or_default(),
            condition: Condition::from(product.condition.as_deref()),
            free_shipping: product
                .shipping
                .as_ref()
                .and_then(|s| s.free_shipping)
                .unwrap_or(false),
            sold_count: product.sold_quantity.unwrap_or(0),
            formatted_price: format_brl(price),
        })
    }

    pub(crate) fn free_shipping_label_str(&self) -> &'static str {
        if self.free_shipping {
            "Sim"
        } else {
            "Não"
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Projection {
    pub(crate) records: Vec<DisplayRecord>,
    /// Products dropped for lacking a price.
    pub(crate) skipped: usize,
}

pub(crate) fn project(products: &[RawProduct]) -> Projection {
    let mut projection = Projection::default();
    for product in products {
        if let Some(record) = DisplayRecord::from_raw(product) {
            projection.records.push(record);
        } else {
            warn!(
                "Skipping product without a price: {}",
                product.permalink.as_deref().unwrap_or("<no link>")
            );
            projection.skipped += 1;
        }
    }
    projection
}

/// Formats `value` the Brazilian way, e.g. `R$ 1.234,56`.
pub(crate) fn format_brl(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    format!("{CURRENCY_PREFIX}{sign}{grouped},{frac_part}")
}
