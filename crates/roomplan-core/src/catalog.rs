//! Furniture catalog entries and lookup.

use crate::geometry::Footprint;
use crate::placement::Placement;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Number of entries [`Catalog::popular`] returns when no limit is given.
pub const DEFAULT_POPULAR_LIMIT: usize = 10;

/// Identifier of a catalog entry.
pub type CatalogItemId = u32;

/// Kind of furniture, used for ordering and filtering the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum FurnitureType {
    Sofa,
    Chair,
    Table,
    Bed,
    Wardrobe,
    Dresser,
    Bookshelf,
    Desk,
    Cabinet,
    Ottoman,
    Bench,
    Nightstand,
    DiningTable,
    CoffeeTable,
    SideTable,
    Armchair,
    Recliner,
    Sectional,
    Loveseat,
    Stool,
    #[default]
    Other,
}

/// A template that placements are instantiated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    /// Business key, unique across the catalog.
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: FurnitureType,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CatalogItem {
    /// Create an active entry with only the fields the planner needs.
    pub fn new(
        id: CatalogItemId,
        code: impl Into<String>,
        name: impl Into<String>,
        width: f64,
        length: f64,
        height: f64,
    ) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            description: None,
            kind: FurnitureType::Other,
            width,
            length,
            height,
            weight: None,
            color: None,
            material: None,
            image_url: None,
            price: None,
            brand: None,
            model: None,
            is_active: true,
        }
    }

    pub fn with_kind(mut self, kind: FurnitureType) -> Self {
        self.kind = kind;
        self
    }

    /// Floor footprint at rotation 0.
    pub fn footprint(&self) -> Footprint {
        Footprint::new(self.width, self.length)
    }
}

/// Read-only access to catalog entries.
pub trait CatalogLookup {
    fn catalog_item(&self, id: CatalogItemId) -> Option<CatalogItem>;
}

/// In-memory catalog keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    items: HashMap<CatalogItemId, CatalogItem>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry. Returns the entry it replaced, if any.
    pub fn insert(&mut self, item: CatalogItem) -> Option<CatalogItem> {
        self.items.insert(item.id, item)
    }

    pub fn get(&self, id: CatalogItemId) -> Option<&CatalogItem> {
        self.items.get(&id)
    }

    /// Find an entry by its business key.
    pub fn by_code(&self, code: &str) -> Option<&CatalogItem> {
        self.items.values().find(|item| item.code == code)
    }

    /// Active entries ordered by type, then name.
    pub fn active(&self) -> Vec<&CatalogItem> {
        let mut items: Vec<&CatalogItem> = self.items.values().filter(|i| i.is_active).collect();
        items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        items
    }

    /// Active entries of one type, ordered by name.
    pub fn by_kind(&self, kind: FurnitureType) -> Vec<&CatalogItem> {
        self.active().into_iter().filter(|i| i.kind == kind).collect()
    }

    /// Case-insensitive search over name, code and brand of active entries.
    pub fn search(&self, term: &str) -> Vec<&CatalogItem> {
        let term = term.to_lowercase();
        self.active()
            .into_iter()
            .filter(|i| {
                i.name.to_lowercase().contains(&term)
                    || i.code.to_lowercase().contains(&term)
                    || i.brand.as_deref().is_some_and(|b| b.to_lowercase().contains(&term))
            })
            .collect()
    }

    /// How many placements use each furniture type.
    ///
    /// Placements of unknown catalog items are not counted. Inactive entries
    /// still count, since rooms may keep using them.
    pub fn usage_by_kind<'a>(&self, placements: impl IntoIterator<Item = &'a Placement>) -> BTreeMap<FurnitureType, usize> {
        let mut usage = BTreeMap::new();
        for placement in placements {
            if let Some(item) = self.get(placement.catalog_item_id) {
                *usage.entry(item.kind).or_insert(0) += 1;
            }
        }
        usage
    }

    /// The `limit` most placed entries with their placement counts, most
    /// used first. Ties are ordered by id.
    pub fn popular<'a>(
        &self,
        placements: impl IntoIterator<Item = &'a Placement>,
        limit: usize,
    ) -> Vec<(&CatalogItem, usize)> {
        let mut counts: BTreeMap<CatalogItemId, usize> = BTreeMap::new();
        for placement in placements {
            if self.items.contains_key(&placement.catalog_item_id) {
                *counts.entry(placement.catalog_item_id).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(&CatalogItem, usize)> = counts
            .into_iter()
            .filter_map(|(id, count)| self.get(id).map(|item| (item, count)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.id.cmp(&b.0.id)));
        ranked.truncate(limit);
        ranked
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CatalogLookup for Catalog {
    fn catalog_item(&self, id: CatalogItemId) -> Option<CatalogItem> {
        self.items.get(&id).cloned()
    }
}

impl FromIterator<CatalogItem> for Catalog {
    fn from_iter<T: IntoIterator<Item = CatalogItem>>(iter: T) -> Self {
        let mut catalog = Catalog::new();
        for item in iter {
            catalog.insert(item);
        }
        catalog
    }
}
