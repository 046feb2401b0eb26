//! Market prices: seeded defaults plus optional price-sheet refresh
//!
//! Listing reads straight from the store. Refresh fetches each configured
//! price-sheet page, strips the markup and parses every line that looks like a
//! price entry. A category is only replaced after all pages have been fetched,
//! so a failed source leaves the table untouched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use growwise_core::config::{MarketConfig, MarketSource};
use growwise_core::error::{GrowError, Result};
use growwise_core::models::{Category, MarketPrice, MarketPriceRecord};
use growwise_core::store::RecordStore;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

/// Built-in price list used when no seed file is configured or readable.
pub fn default_prices() -> Vec<MarketPrice> {
    use Category::{Fruit, Vegetable};

    let rows: [(&str, Category, f64, f64, &str); 20] = [
        ("Onion", Vegetable, 30.0, 40.0, "kg"),
        ("Tomato", Vegetable, 25.0, 35.0, "kg"),
        ("Potato", Vegetable, 20.0, 25.0, "kg"),
        ("Carrot", Vegetable, 35.0, 45.0, "kg"),
        ("Cabbage", Vegetable, 15.0, 20.0, "kg"),
        ("Cauliflower", Vegetable, 25.0, 30.0, "kg"),
        ("Green Beans", Vegetable, 40.0, 50.0, "kg"),
        ("Okra (Ladyfinger)", Vegetable, 30.0, 40.0, "kg"),
        ("Brinjal (Eggplant)", Vegetable, 25.0, 35.0, "kg"),
        ("Bell Pepper", Vegetable, 50.0, 60.0, "kg"),
        ("Apple", Fruit, 120.0, 150.0, "kg"),
        ("Banana", Fruit, 40.0, 50.0, "dozen"),
        ("Orange", Fruit, 60.0, 80.0, "kg"),
        ("Mango", Fruit, 80.0, 120.0, "kg"),
        ("Grapes", Fruit, 100.0, 140.0, "kg"),
        ("Papaya", Fruit, 25.0, 35.0, "kg"),
        ("Watermelon", Fruit, 15.0, 20.0, "kg"),
        ("Pineapple", Fruit, 30.0, 40.0, "piece"),
        ("Pomegranate", Fruit, 150.0, 200.0, "kg"),
        ("Guava", Fruit, 40.0, 60.0, "kg"),
    ];

    rows.iter()
        .map(|(name, category, low, high, unit)| {
            MarketPrice::new(name, *category, *low, Some(*high), unit)
        })
        .collect()
}

fn sheet_counts(sheets: &[(Category, Vec<MarketPrice>)]) -> BTreeMap<String, usize> {
    sheets
        .iter()
        .map(|(category, rows)| (category.to_string(), rows.len()))
        .collect()
}

/// Read a JSON array of prices from `path` (`~` expanded). Any failure falls back
/// to `default_prices()` with a warning.
pub fn load_seed(path: Option<&str>) -> Vec<MarketPrice> {
    let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
        return default_prices();
    };
    let expanded = shellexpand::tilde(path).into_owned();

    let parsed = std::fs::read_to_string(&expanded)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str::<Vec<MarketPrice>>(&text).map_err(|e| e.to_string()));

    match parsed {
        Ok(prices) if !prices.is_empty() => {
            let total = prices.len();
            let prices: Vec<MarketPrice> =
                prices.into_iter().filter(MarketPrice::has_valid_prices).collect();
            if prices.len() < total {
                warn!(path = %expanded, dropped = total - prices.len(), "Skipped seed entries with invalid prices");
            }
            if prices.is_empty() {
                return default_prices();
            }
            info!(path = %expanded, count = prices.len(), "Loaded market seed file");
            prices
        }
        Ok(_) => {
            warn!(path = %expanded, "Market seed file is empty, using built-in prices");
            default_prices()
        }
        Err(e) => {
            warn!(path = %expanded, error = %e, "Could not read market seed file, using built-in prices");
            default_prices()
        }
    }
}

// ============================================================================
// Price-sheet parsing
// ============================================================================

/// Turns price-sheet text into `MarketPrice` entries.
///
/// Two line forms are recognised:
/// - range: `Onion : 20 - 30` (the colon is optional)
/// - single: `Ginger 245.00`
///
/// Names must contain no digits; anything else on the page is ignored.
#[derive(Debug, Clone)]
pub struct PriceLineParser {
    dropped_blocks: Regex,
    line_breaks: Regex,
    tags: Regex,
    range: Regex,
    single: Regex,
}

impl PriceLineParser {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| GrowError::Internal(format!("price pattern: {}", e)))
        };

        Ok(Self {
            dropped_blocks: compile(r"(?is)<(script|style)[^>]*>.*?</(script|style)>")?,
            line_breaks: compile(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6]|table)>")?,
            tags: compile(r"<[^>]*>")?,
            range: compile(
                r"^(?P<name>[^\d:]*[^\d\s:])\s*:?\s*(?P<low>\d+(?:\.\d+)?)\s*-\s*(?P<high>\d+(?:\.\d+)?)$",
            )?,
            single: compile(r"^(?P<name>[^\d:]*[^\d\s:])\s*:?\s+(?P<price>\d+(?:\.\d+)?)$")?,
        })
    }

    /// Reduce an HTML page to plain text lines.
    pub fn strip_markup(&self, html: &str) -> String {
        let text = self.dropped_blocks.replace_all(html, "");
        let text = self.line_breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, " ");
        text.replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
    }

    pub fn parse_line(&self, line: &str, category: Category) -> Option<MarketPrice> {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            return None;
        }

        if let Some(caps) = self.range.captures(&line) {
            let low: f64 = caps["low"].parse().ok()?;
            let high: f64 = caps["high"].parse().ok()?;
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            return Some(MarketPrice::new(caps["name"].trim(), category, low, Some(high), "kg"));
        }

        let caps = self.single.captures(&line)?;
        let price: f64 = caps["price"].parse().ok()?;
        Some(MarketPrice::new(caps["name"].trim(), category, price, None, "kg"))
    }

    /// Parse every line of a page. Later duplicates of a name are dropped.
    pub fn parse_page(&self, html: &str, category: Category) -> Vec<MarketPrice> {
        let text = self.strip_markup(html);
        let mut seen = std::collections::HashSet::new();
        text.lines()
            .filter_map(|line| self.parse_line(line, category))
            .filter(|p| seen.insert(p.name.to_lowercase()))
            .collect()
    }
}

// ============================================================================
// MarketService
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// "sources" when price sheets were fetched, "seed" otherwise.
    pub origin: &'static str,
    pub counts: BTreeMap<String, usize>,
}

#[derive(Clone)]
pub struct MarketService {
    store: Arc<dyn RecordStore>,
    client: reqwest::Client,
    parser: PriceLineParser,
    sources: Vec<MarketSource>,
    seed_file: Option<String>,
}

impl MarketService {
    pub fn new(store: Arc<dyn RecordStore>, config: &MarketConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GrowError::Internal(format!("http client: {}", e)))?;

        for source in &config.sources {
            source
                .category
                .parse::<Category>()
                .map_err(|e| GrowError::validation(format!("market source {}: {}", source.url, e)))?;
        }

        Ok(Self {
            store,
            client,
            parser: PriceLineParser::new()?,
            sources: config.sources.clone(),
            seed_file: config.seed_file.clone(),
        })
    }

    /// `None`, empty or `"all"` lists every category. An unknown category
    /// yields an empty list rather than an error.
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<MarketPriceRecord>> {
        let filter = match category.map(str::trim) {
            None | Some("") => None,
            Some(c) if c.eq_ignore_ascii_case("all") => None,
            Some(c) => match c.parse::<Category>() {
                Ok(category) => Some(category),
                Err(_) => return Ok(Vec::new()),
            },
        };
        self.store.market_prices(filter).await
    }

    /// Seed the table when it has no rows at all.
    pub async fn ensure_seeded(&self) -> Result<Option<RefreshReport>> {
        if !self.store.market_prices(None).await?.is_empty() {
            return Ok(None);
        }
        self.reseed().await.map(Some)
    }

    /// Replace both categories from the seed file or built-in defaults.
    pub async fn reseed(&self) -> Result<RefreshReport> {
        let prices = load_seed(self.seed_file.as_deref());
        let sheets: Vec<(Category, Vec<MarketPrice>)> = Category::ALL
            .into_iter()
            .map(|category| {
                let rows = prices.iter().filter(|p| p.category == category).cloned().collect();
                (category, rows)
            })
            .collect();

        self.store.replace_market_catalog(&sheets).await?;
        let counts = sheet_counts(&sheets);

        info!(?counts, "Market prices seeded");
        Ok(RefreshReport {
            origin: "seed",
            counts,
        })
    }

    /// Fetch every configured price sheet, then replace the categories that
    /// produced rows. Without sources this is `reseed`.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        if self.sources.is_empty() {
            return self.reseed().await;
        }

        let mut fetched: BTreeMap<Category, Vec<MarketPrice>> = BTreeMap::new();
        for source in &self.sources {
            let category: Category = source
                .category
                .parse()
                .map_err(GrowError::Validation)?;
            let page = self.fetch_page(&source.url).await?;
            let mut rows = self.parser.parse_page(&page, category);
            info!(url = %source.url, %category, parsed = rows.len(), "Price sheet parsed");
            fetched.entry(category).or_default().append(&mut rows);
        }

        let mut sheets = Vec::new();
        for (category, rows) in fetched {
            if rows.is_empty() {
                warn!(%category, "No price lines found, keeping existing rows");
            }
            sheets.push((category, rows));
        }

        let counts = sheet_counts(&sheets);
        sheets.retain(|(_, rows)| !rows.is_empty());
        if !sheets.is_empty() {
            self.store.replace_market_catalog(&sheets).await?;
        }

        Ok(RefreshReport {
            origin: "sources",
            counts,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let unavailable = |status: Option<u16>, message: String| GrowError::ProviderUnavailable {
            status,
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(
                Some(status.as_u16()),
                format!("price sheet {} returned {}", url, status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| unavailable(Some(status.as_u16()), e.to_string()))
    }
}
