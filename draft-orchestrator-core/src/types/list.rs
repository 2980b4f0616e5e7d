//! Master list type definitions

use serde::{Deserialize, Serialize};

use super::draft::{is_real_draft_id, DraftAdministrativeData, DraftRef, EntityKey};

/// Row of the product collection as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    /// Product id, absent for a draft of a new product
    pub product: Option<String>,
    /// Draft UUID, absent (or the null UUID) for active entities
    pub draft_uuid: Option<String>,
    pub is_active_entity: bool,
    /// Active entity has a draft (own or other user's)
    #[serde(default)]
    pub has_draft_entity: bool,
    /// Draft is backed by an active entity
    #[serde(default)]
    pub has_active_entity: bool,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub main_category: String,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub administrative: Option<DraftAdministrativeData>,
}

impl ProductRow {
    /// Active product row
    pub fn active(product: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            product: Some(product.into()),
            draft_uuid: None,
            is_active_entity: true,
            has_draft_entity: false,
            has_active_entity: false,
            name: name.into(),
            price: None,
            currency: String::new(),
            category: String::new(),
            main_category: String::new(),
            availability: String::new(),
            administrative: None,
        }
    }

    /// Draft row
    pub fn draft(
        product: Option<String>,
        draft_uuid: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let has_active_entity = product.is_some();
        Self {
            product,
            draft_uuid: Some(draft_uuid.into()),
            is_active_entity: false,
            has_active_entity,
            ..Self::active("", name)
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_category(mut self, main: impl Into<String>, sub: impl Into<String>) -> Self {
        self.main_category = main.into();
        self.category = sub.into();
        self
    }

    #[must_use]
    pub fn with_administrative(mut self, admin: DraftAdministrativeData) -> Self {
        self.has_draft_entity = self.is_active_entity;
        self.administrative = Some(admin);
        self
    }

    pub fn product_id(&self) -> Option<&str> {
        self.product.as_deref().filter(|id| !id.is_empty())
    }

    pub fn draft_id(&self) -> Option<&str> {
        self.draft_uuid.as_deref().filter(|id| is_real_draft_id(id))
    }

    /// Id identifying the row in the list: the product id, else the draft id.
    pub fn relevant_id(&self) -> Option<&str> {
        self.product_id().or(self.draft_id())
    }

    /// Key used to delete the entity this row shows
    pub fn entity_key(&self) -> Option<EntityKey> {
        match (self.is_active_entity, self.product_id(), self.draft_id()) {
            (true, Some(product), _) => Some(EntityKey::product(product)),
            (false, product, Some(draft)) => {
                Some(EntityKey::draft(product.map(ToString::to_string), draft))
            }
            _ => None,
        }
    }

    /// Draft reference for a draft row
    pub fn draft_ref(&self) -> Option<DraftRef> {
        if self.is_active_entity {
            return None;
        }
        let draft_id = self.draft_id()?;
        let admin = self.administrative.as_ref()?;
        Some(DraftRef {
            product_id: self.product_id().map(ToString::to_string),
            draft_id: draft_id.to_string(),
            is_active: false,
            has_active_entity: self.has_active_entity,
            created_by_current_user: admin.draft_is_created_by_me,
            created_at: admin.creation_date_time,
            last_changed_at: admin.last_change_date_time,
        })
    }
}

/// Entry of the master list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemRef {
    /// Product id or draft id; group key for headers
    pub id: String,
    pub position: usize,
    pub is_group_header: bool,
    /// Caption of a group header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Filter operators supported by the product query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOperator {
    Eq,
    Le,
    Ge,
    Bt,
}

/// Single query filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub path: String,
    pub operator: FilterOperator,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_to: Option<String>,
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operator: FilterOperator::Eq,
            value: value.into(),
            value_to: None,
        }
    }

    /// Whether a row satisfies this filter. Paths the row does not know match.
    pub fn matches(&self, row: &ProductRow) -> bool {
        match self.path.as_str() {
            "Price" => {
                let Some(price) = row.price else {
                    return false;
                };
                let bound = |v: &str| v.parse::<f64>().unwrap_or_default();
                match self.operator {
                    FilterOperator::Eq => (price - bound(&self.value)).abs() < f64::EPSILON,
                    FilterOperator::Le => price <= bound(&self.value),
                    FilterOperator::Ge => price >= bound(&self.value),
                    FilterOperator::Bt => {
                        let upper = self.value_to.as_deref().map_or(f64::MAX, bound);
                        price >= bound(&self.value) && price <= upper
                    }
                }
            }
            "StockAvailability" => row.availability == self.value,
            "IsActiveEntity" => row.is_active_entity.to_string() == self.value,
            "HasDraftEntity" => row.has_draft_entity.to_string() == self.value,
            "MainProductCategory" => row.main_category == self.value,
            "ProductCategory" => row.category == self.value,
            _ => true,
        }
    }
}

/// Price bands offered by the filter and grouping dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceBand {
    #[serde(rename = "LE100")]
    UpTo100,
    #[serde(rename = "BT100-500")]
    From100To500,
    #[serde(rename = "BT500-1000")]
    From500To1000,
    #[serde(rename = "GT1000")]
    Above1000,
}

impl PriceBand {
    pub fn key(self) -> &'static str {
        match self {
            Self::UpTo100 => "LE100",
            Self::From100To500 => "BT100-500",
            Self::From500To1000 => "BT500-1000",
            Self::Above1000 => "GT1000",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "LE100" => Some(Self::UpTo100),
            "BT100-500" => Some(Self::From100To500),
            "BT500-1000" => Some(Self::From500To1000),
            "GT1000" => Some(Self::Above1000),
            _ => None,
        }
    }

    pub fn filter(self) -> Filter {
        let (operator, value, value_to) = match self {
            Self::UpTo100 => (FilterOperator::Le, "100", None),
            Self::From100To500 => (FilterOperator::Bt, "100", Some("500")),
            Self::From500To1000 => (FilterOperator::Bt, "500", Some("1000")),
            Self::Above1000 => (FilterOperator::Ge, "1000", None),
        };
        Filter {
            path: "Price".to_string(),
            operator,
            value: value.to_string(),
            value_to: value_to.map(ToString::to_string),
        }
    }

    /// Band used for grouping; `None` when the price is unknown.
    pub fn for_price(price: Option<f64>) -> Option<Self> {
        let price = price?;
        Some(if price <= 100.0 {
            Self::UpTo100
        } else if price <= 500.0 {
            Self::From100To500
        } else if price <= 1000.0 {
            Self::From500To1000
        } else {
            Self::Above1000
        })
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::UpTo100 => "Price between 0-100",
            Self::From100To500 => "Price between 100-500",
            Self::From500To1000 => "Price between 500-1000",
            Self::Above1000 => "Price above 1000",
        }
    }
}

/// Editing status filter of the master list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditingStatus {
    /// Own drafts
    Draft,
    /// Products with a draft of any user
    Locked,
    /// Active products
    Active,
}

impl EditingStatus {
    pub fn filter(self) -> Filter {
        match self {
            Self::Draft => Filter::eq("IsActiveEntity", "false"),
            Self::Locked => Filter::eq("HasDraftEntity", "true"),
            Self::Active => Filter::eq("IsActiveEntity", "true"),
        }
    }
}

/// Sort criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sorter {
    pub path: String,
    #[serde(default)]
    pub descending: bool,
}

impl Sorter {
    pub fn ascending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            descending: false,
        }
    }
}

/// Attribute the master list can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupBy {
    Price,
    Availability,
    MainCategory,
    Category,
}

/// Grouping of the master list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouping {
    pub by: GroupBy,
    #[serde(default)]
    pub descending: bool,
}

impl Grouping {
    /// Group key and header caption of a row
    pub fn group_of(&self, row: &ProductRow) -> (String, String) {
        match self.by {
            GroupBy::Price => PriceBand::for_price(row.price).map_or_else(
                || ("unknownPrice".to_string(), "?".to_string()),
                |band| (band.key().to_string(), band.title().to_string()),
            ),
            GroupBy::Availability => {
                let text = if row.availability.is_empty() {
                    "Availability undefined".to_string()
                } else {
                    row.availability.clone()
                };
                (text.clone(), text)
            }
            GroupBy::MainCategory => (
                row.main_category.clone(),
                format!("Main Category: {}", row.main_category),
            ),
            GroupBy::Category => (
                row.category.clone(),
                format!("Category: {}", row.category),
            ),
        }
    }

    /// Sort path the backend has to order by first so that groups are contiguous
    pub fn sort_path(&self) -> &'static str {
        match self.by {
            GroupBy::Price => "Price",
            GroupBy::Availability => "StockAvailability",
            GroupBy::MainCategory => "MainProductCategory",
            GroupBy::Category => "ProductCategory",
        }
    }
}

/// Query sent to the backend when (re)loading the master list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorters: Vec<Sorter>,
    #[serde(default)]
    pub grouping: Option<Grouping>,
}

impl ListQuery {
    pub fn new(default_sort: impl Into<String>) -> Self {
        Self {
            search_term: None,
            filters: Vec::new(),
            sorters: vec![Sorter::ascending(default_sort)],
            grouping: None,
        }
    }

    /// Whether the result set is narrowed by a search or a filter
    pub fn is_restricted(&self) -> bool {
        self.search_term.as_deref().is_some_and(|term| !term.is_empty()) || !self.filters.is_empty()
    }

    /// Sorters to apply; the grouping attribute comes first so that groups are contiguous.
    pub fn effective_sorters(&self) -> Vec<Sorter> {
        let mut sorters = Vec::with_capacity(self.sorters.len() + 1);
        if let Some(grouping) = &self.grouping {
            sorters.push(Sorter {
                path: grouping.sort_path().to_string(),
                descending: grouping.descending,
            });
        }
        sorters.extend(self.sorters.iter().cloned());
        sorters
    }

    /// Merge the requested changes into this query
    pub fn apply(&mut self, change: QueryChange) {
        if let Some(term) = change.search_term {
            self.search_term = Some(term).filter(|term| !term.is_empty());
        }
        if let Some(filters) = change.filters {
            self.filters = filters;
        }
        if let Some(sorters) = change.sorters {
            self.sorters = sorters;
        }
        if let Some(grouping) = change.grouping {
            self.grouping = grouping;
        }
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new("Name")
    }
}

/// Changes to the list query requested by the search field or the
/// sort/filter/group dialogs. `None` leaves the current setting untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryChange {
    pub search_term: Option<String>,
    pub filters: Option<Vec<Filter>>,
    pub sorters: Option<Vec<Sorter>>,
    /// `Some(None)` removes the grouping
    pub grouping: Option<Option<Grouping>>,
}

/// Classification of a row selected for bulk deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeletionClass {
    /// Draft in process by another user, cannot be deleted
    Locked { user: String },
    /// Another user's draft whose lock has expired; deleting discards their changes
    Unsaved { user: String },
    /// Active entity or own draft
    Deletable,
}

impl DeletionClass {
    /// Classify a row. Locked takes precedence over Unsaved, which takes
    /// precedence over Deletable.
    pub fn of(row: &ProductRow) -> Self {
        match row.administrative.as_ref() {
            Some(admin) if row.has_draft_entity && admin.is_locked() => Self::Locked {
                user: admin.in_process_by_user.clone(),
            },
            Some(admin) if row.has_draft_entity && !admin.draft_is_created_by_me => {
                Self::Unsaved {
                    user: admin.last_changed_by_user.clone(),
                }
            }
            _ => Self::Deletable,
        }
    }
}
