//! Market data and least-cost pricing of net requirements

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calculator::NetNeeds;
use crate::error::SourceError;
use crate::models::{CURRENCY_ID, CURRENCY_PRICE};

/// Which side of the flat market to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    #[default]
    Buy,
    Sell,
}

/// Direct unit prices for one item on the flat market
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatQuote {
    #[serde(default)]
    pub buy_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
}

impl FlatQuote {
    pub fn price(&self, mode: PriceMode) -> Option<f64> {
        match mode {
            PriceMode::Buy => self.buy_price,
            PriceMode::Sell => self.sell_price,
        }
    }
}

/// One individual listing
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Offer {
    pub price: f64,
    pub count: u64,
}

/// Listing feed record as served
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRecord {
    pub id: String,
    #[serde(default)]
    pub sales: Vec<Offer>,
}

/// Bulk market feed keyed by item id
#[allow(async_fn_in_trait)]
pub trait FlatFeed {
    async fn fetch_flat(&self) -> Result<HashMap<String, FlatQuote>, SourceError>;
}

/// Individual listing feed
#[allow(async_fn_in_trait)]
pub trait ListingFeed {
    async fn fetch_listings(&self) -> Result<Vec<ListingRecord>, SourceError>;
}

/// Both feeds over HTTP. Without a listing URL the listing feed is empty.
#[derive(Debug, Clone)]
pub struct HttpMarketFeeds {
    client: reqwest::Client,
    flat_url: String,
    listings_url: Option<String>,
}

impl HttpMarketFeeds {
    pub fn new(client: reqwest::Client, flat_url: impl Into<String>, listings_url: Option<String>) -> Self {
        Self {
            client,
            flat_url: flat_url.into(),
            listings_url,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

impl FlatFeed for HttpMarketFeeds {
    async fn fetch_flat(&self) -> Result<HashMap<String, FlatQuote>, SourceError> {
        self.get_json(&self.flat_url).await
    }
}

impl ListingFeed for HttpMarketFeeds {
    async fn fetch_listings(&self) -> Result<Vec<ListingRecord>, SourceError> {
        match &self.listings_url {
            Some(url) => self.get_json(url).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Snapshot of both price feeds. Refreshed independently of any tree.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    flat: HashMap<String, FlatQuote>,
    listings: HashMap<String, Vec<Offer>>,
}

impl MarketData {
    pub fn new(flat: HashMap<String, FlatQuote>, listings: Vec<ListingRecord>) -> Self {
        Self {
            flat,
            listings: listings.into_iter().map(|r| (r.id, r.sales)).collect(),
        }
    }

    /// Fetch both feeds concurrently. A failing feed is logged and treated
    /// as empty so pricing can still proceed.
    pub async fn fetch(flat: &impl FlatFeed, listings: &impl ListingFeed) -> Self {
        let (flat, listings) = futures::join!(flat.fetch_flat(), listings.fetch_listings());
        let flat = flat.unwrap_or_else(|err| {
            warn!(error = %err, "flat price feed unavailable");
            HashMap::new()
        });
        let listings = listings.unwrap_or_else(|err| {
            warn!(error = %err, "listing feed unavailable");
            Vec::new()
        });
        debug!(flat = flat.len(), listings = listings.len(), "market data loaded");
        Self::new(flat, listings)
    }

    /// Flat quote for `item_id`, trying the suffix-qualified key forms used
    /// by the bazaar (`NAME;LVL` -> `NAME_LVL`, `ENCHANTMENT_NAME_LVL`).
    pub fn flat_quote(&self, item_id: &str) -> Option<&FlatQuote> {
        if let Some(quote) = self.flat.get(item_id) {
            return Some(quote);
        }
        if !item_id.contains(';') {
            return None;
        }
        let underscored = item_id.replace(';', "_");
        self.flat
            .get(&underscored)
            .or_else(|| self.flat.get(&format!("ENCHANTMENT_{underscored}")))
    }

    pub fn offers(&self, item_id: &str) -> Option<&[Offer]> {
        self.listings.get(item_id).map(Vec::as_slice)
    }
}

/// Where a price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSource {
    Currency,
    Flat(PriceMode),
    Listings,
    Unavailable,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency => write!(f, "currency"),
            Self::Flat(PriceMode::Buy) => write!(f, "bazaar buy"),
            Self::Flat(PriceMode::Sell) => write!(f, "bazaar sell"),
            Self::Listings => write!(f, "listings"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub item_id: String,
    pub display_name: String,
    pub quantity: u64,
    /// `None` when no feed has data; distinct from a computed zero.
    pub unit_cost: Option<f64>,
    pub total_cost: Option<f64>,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostReport {
    pub items: Vec<PricedItem>,
    /// Sum of every available total
    pub grand_total: f64,
}

impl CostReport {
    pub fn unavailable(&self) -> impl Iterator<Item = &PricedItem> {
        self.items.iter().filter(|i| i.source == PriceSource::Unavailable)
    }
}

/// Cheapest-first fill of `quantity` from `offers`.
///
/// Units beyond the listed supply are priced at the most expensive listing.
/// Returns `None` when there is nothing listed at all.
pub fn fill_from_listings(offers: &[Offer], quantity: u64) -> Option<f64> {
    let mut sorted: Vec<Offer> = offers.iter().copied().filter(|o| o.count > 0).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut remaining = quantity;
    let mut total = 0.0;
    for offer in &sorted {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(offer.count);
        total += take as f64 * offer.price;
        remaining -= take;
    }

    if remaining > 0 {
        let highest = sorted.last().map_or(0.0, |o| o.price);
        total += remaining as f64 * highest;
    }
    Some(total)
}

/// Price one item by the first applicable rule: currency, flat feed in
/// `mode`, listing fill, else unavailable.
pub fn price_item(item_id: &str, quantity: u64, market: &MarketData, mode: PriceMode) -> (Option<f64>, Option<f64>, PriceSource) {
    if item_id == CURRENCY_ID {
        return (Some(CURRENCY_PRICE), Some(CURRENCY_PRICE * quantity as f64), PriceSource::Currency);
    }

    if let Some(unit) = market.flat_quote(item_id).and_then(|q| q.price(mode)) {
        return (Some(unit), Some(unit * quantity as f64), PriceSource::Flat(mode));
    }

    if let Some(total) = market.offers(item_id).and_then(|offers| fill_from_listings(offers, quantity)) {
        let unit = if quantity == 0 { 0.0 } else { total / quantity as f64 };
        return (Some(unit), Some(total), PriceSource::Listings);
    }

    (None, None, PriceSource::Unavailable)
}

/// Price every net requirement. Items come out in id order.
pub fn price(needs: &NetNeeds, market: &MarketData, mode: PriceMode) -> CostReport {
    let mut report = CostReport::default();
    for (item_id, need) in &needs.items {
        let (unit_cost, total_cost, source) = price_item(item_id, need.quantity, market, mode);
        if let Some(total) = total_cost {
            report.grand_total += total;
        }
        report.items.push(PricedItem {
            item_id: item_id.clone(),
            display_name: need.display_name.clone(),
            quantity: need.quantity,
            unit_cost,
            total_cost,
            source,
        });
    }
    report
}

impl fmt::Display for CostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<32} {:>12} {:>14} {:>16}  {}", "Resource", "Quantity", "Unit", "Total", "Source")?;
        for item in &self.items {
            let unit = item.unit_cost.map_or_else(|| "n/a".to_string(), |u| format!("{u:.1}"));
            let total = item.total_cost.map_or_else(|| "n/a".to_string(), |t| format!("{t:.0}"));
            writeln!(
                f,
                "{:<32} {:>12} {:>14} {:>16}  {}",
                item.display_name, item.quantity, unit, total, item.source
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Total: {:.0} coins", self.grand_total)?;
        let missing: Vec<&str> = self.unavailable().map(|i| i.display_name.as_str()).collect();
        if !missing.is_empty() {
            writeln!(f, "No price data: {}", missing.join(", "))?;
        }
        Ok(())
    }
}
