//! Product catalog
//!
//! Fetches the storefront listing and turns it into display-ready cards.
//! The listing is grouped by category; category order is kept exactly as
//! served.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::failure_message;
use crate::config::WidgetConfig;
use crate::error::{WidgetError, WidgetResult};

pub const EMPTY_CATALOG_TEXT: &str = "No products available.";
pub const PRICE_ON_REQUEST: &str = "Price on request";
pub const CURRENCY: &str = "PKR";

/// One product as served by the backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
}

/// Raw listing, category name to item list
///
/// Entries are kept as raw JSON because the backend does not guarantee that
/// every category holds a list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Catalog {
    pub products: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogBody {
    products: Option<Value>,
}

/// One rendered product line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductLine {
    pub name: String,
    pub description: String,
    pub price: String,
}

/// One rendered category card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductCard {
    pub category: String,
    pub items: Vec<ProductLine>,
}

/// What the product grid shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CatalogView {
    Cards(Vec<ProductCard>),
    Empty(String),
    Error(String),
}

/// Client for `GET /api/products`
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> WidgetResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WidgetError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn from_config(config: &WidgetConfig) -> WidgetResult<Self> {
        Self::new(config.backend_url.clone(), config.http_timeout())
    }

    /// Fetch the listing
    pub async fn fetch(&self) -> WidgetResult<Catalog> {
        debug!("Loading products from {}", self.base_url);

        let res = self
            .http
            .get(format!("{}/api/products", self.base_url))
            .send()
            .await
            .map_err(|e| WidgetError::catalog(format!("Failed to load products: {e}")))?;

        if !res.status().is_success() {
            let message = failure_message(res).await;
            return Err(WidgetError::catalog(format!("Failed to load products: {message}")));
        }

        let body: CatalogBody = res
            .json()
            .await
            .map_err(|_| WidgetError::catalog("Invalid product data format"))?;

        match body.products {
            Some(Value::Object(products)) => {
                info!("Loaded {} product categories", products.len());
                Ok(Catalog { products })
            }
            _ => Err(WidgetError::catalog("Invalid product data format")),
        }
    }

    /// Fetch and render, turning any failure into an error view
    pub async fn load_view(&self) -> CatalogView {
        match self.fetch().await {
            Ok(catalog) => render_catalog(&catalog),
            Err(e) => {
                warn!("Error loading products: {}", e);
                CatalogView::Error(e.to_string())
            }
        }
    }
}

/// Build the product grid for a listing
pub fn render_catalog(catalog: &Catalog) -> CatalogView {
    if catalog.products.is_empty() {
        return CatalogView::Empty(EMPTY_CATALOG_TEXT.to_string());
    }

    let cards = catalog
        .products
        .iter()
        .filter_map(|(category, items)| {
            let items = items.as_array().filter(|items| !items.is_empty())?;
            Some(ProductCard {
                category: category.clone(),
                items: items.iter().filter_map(|item| render_item(category, item)).collect(),
            })
        })
        .collect();

    CatalogView::Cards(cards)
}

fn render_item(category: &str, item: &Value) -> Option<ProductLine> {
    match serde_json::from_value::<Product>(item.clone()) {
        Ok(product) => Some(ProductLine {
            price: product.price.map(format_price).unwrap_or_else(|| PRICE_ON_REQUEST.to_string()),
            name: product.name,
            description: product.description,
        }),
        Err(e) => {
            warn!("Skipping malformed product in {}: {}", category, e);
            None
        }
    }
}

/// `PKR 12,500`, or "Price on request" for a zero price
///
/// Digits are grouped in thousands with at most three fraction digits.
pub fn format_price(price: f64) -> String {
    if price == 0.0 || !price.is_finite() {
        return PRICE_ON_REQUEST.to_string();
    }

    let rendered = format!("{:.3}", price.abs());
    let (whole, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if price < 0.0 { "-" } else { "" };
    if fraction.is_empty() {
        format!("{CURRENCY} {sign}{grouped}")
    } else {
        format!("{CURRENCY} {sign}{grouped}.{fraction}")
    }
}
