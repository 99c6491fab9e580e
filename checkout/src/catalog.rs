//! The festival catalog: every item a visitor can register for.
//!
//! The catalog is built once at startup and never mutated. Prices are kept
//! as the display text the organisers wrote ("₹85-120", "₹40/squad",
//! "Free"); [`parse_price`] turns that into the base price used for totals.

use crate::error::ConfigError;
use crate::types::{ItemId, Money};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Event category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Premium events bundling support-artist and visitor-pass perks
    Flagship,
    /// Fun & Games (includes esports)
    FunAndGames,
    /// Creative Arts
    CreativeArts,
    /// Workshops & Talks
    WorkshopsAndTalks,
    /// Special Events
    SpecialEvents,
}

/// A purchasable item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// Unique id
    pub id: ItemId,
    /// Display title, also the key into the team size table
    pub title: String,
    /// Price as displayed
    pub price_text: String,
    /// Category
    pub category: Category,
    /// Event date (`YYYY-MM-DD`)
    pub date: String,
    /// Start time (`HH:MM`)
    pub time: String,
    /// End time (`HH:MM`)
    pub end_time: String,
    /// Team size as displayed ("4-5"), when the event is for teams
    pub team_size_text: Option<String>,
}

impl CatalogItem {
    /// Base price parsed from the price text
    #[must_use]
    pub fn base_price(&self) -> Money {
        parse_price(&self.price_text)
    }

    /// Whether this is a flagship item
    #[must_use]
    pub fn is_flagship(&self) -> bool {
        self.category == Category::Flagship
    }

    /// Start and end of the event, if the date and times parse
    #[must_use]
    pub fn schedule(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()?;
        let start = NaiveTime::parse_from_str(&self.time, "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(&self.end_time, "%H:%M").ok()?;
        Some((date.and_time(start), date.and_time(end)))
    }
}

#[allow(clippy::expect_used)]
static PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₹|\brs\.?|\binr)\s*(\d[\d,]*)(?:\.(\d{1,2}))?")
        .expect("price pattern is valid")
});

/// Parse the first currency amount out of a price text.
///
/// - `"₹85-120"` → ₹85 (a range uses the lower bound)
/// - `"₹40/squad"` → ₹40
/// - `"Rs. 1,500"` → ₹1500
/// - `"Free"`, `""`, text without a currency marker → ₹0
#[must_use]
pub fn parse_price(text: &str) -> Money {
    let Some(captures) = PRICE.captures(text) else {
        return Money::ZERO;
    };

    let rupees = captures
        .get(1)
        .map(|m| m.as_str().replace(',', ""))
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(0);

    let paise = captures
        .get(2)
        .map(|m| {
            let digits = m.as_str();
            let value = digits.parse::<u64>().unwrap_or(0);
            if digits.len() == 1 { value * 10 } else { value }
        })
        .unwrap_or(0);

    Money::from_rupees(rupees) + Money::from_paise(paise)
}

/// Immutable registry of catalog items, keyed by id
#[derive(Clone, Debug)]
pub struct Catalog {
    items: BTreeMap<ItemId, CatalogItem>,
}

impl Catalog {
    /// Build a catalog from items.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateItem`] if two items share an id.
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for item in items {
            let id = item.id;
            if map.insert(id, item).is_some() {
                return Err(ConfigError::DuplicateItem(id.0));
            }
        }
        Ok(Self { items: map })
    }

    /// The built-in festival lineup
    #[must_use]
    pub fn festival() -> Self {
        use Category::{CreativeArts, Flagship, FunAndGames, SpecialEvents, WorkshopsAndTalks};

        let lineup = [
            (1, "STEP UP", "₹40", Flagship, "2026-03-06", "10:00", "12:00", None),
            (2, "RAMP WALK", "₹1500/team", Flagship, "2026-03-06", "18:00", "20:00", Some("10-21")),
            (3, "BATTLE OF BANDS", "₹1200/band", Flagship, "2026-03-07", "17:00", "21:00", Some("4-8")),
            (4, "TREASURE HUNT", "₹85-120", FunAndGames, "2026-03-06", "11:00", "13:00", None),
            (5, "OPEN MIC", "₹45", CreativeArts, "2026-03-06", "15:00", "16:30", None),
            (6, "VALORANT", "₹250/team", FunAndGames, "2026-03-07", "10:00", "16:00", Some("5-6")),
            (7, "BGMI", "₹200/squad", FunAndGames, "2026-03-07", "10:00", "14:00", Some("4-5")),
            (8, "FREE FIRE", "₹40/squad", FunAndGames, "2026-03-08", "10:00", "13:00", Some("4")),
            (9, "GROUP DANCE", "₹600/team", CreativeArts, "2026-03-08", "16:00", "18:00", Some("6-15")),
            (10, "SOLO SINGING", "₹99", CreativeArts, "2026-03-08", "12:00", "13:30", None),
            (11, "PHOTOGRAPHY WALK", "Free", WorkshopsAndTalks, "2026-03-06", "07:00", "09:00", None),
            (12, "STARTUP PITCH TALK", "Free", WorkshopsAndTalks, "2026-03-07", "11:00", "12:30", None),
            (13, "CELEBRITY NIGHT", "₹499", SpecialEvents, "2026-03-08", "19:00", "23:00", None),
            (14, "STAND-UP COMEDY", "₹149", SpecialEvents, "2026-03-07", "20:00", "21:30", None),
        ];

        let items = lineup
            .into_iter()
            .map(|(id, title, price, category, date, time, end, team)| {
                (
                    ItemId(id),
                    CatalogItem {
                        id: ItemId(id),
                        title: title.to_string(),
                        price_text: price.to_string(),
                        category,
                        date: date.to_string(),
                        time: time.to_string(),
                        end_time: end.to_string(),
                        team_size_text: team.map(str::to_string),
                    },
                )
            })
            .collect();

        Self { items }
    }

    /// Look up an item by id
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&CatalogItem> {
        self.items.get(&id)
    }

    /// Whether the catalog has an item with this id
    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// Look up an item by exact (case-insensitive) title
    #[must_use]
    pub fn by_title(&self, title: &str) -> Option<&CatalogItem> {
        self.items
            .values()
            .find(|item| item.title.eq_ignore_ascii_case(title.trim()))
    }

    /// All items, ordered by id
    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.values()
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
