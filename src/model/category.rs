use crate::model::Amount;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The identity of a stored `Category`, assigned by the database.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(i64);

impl CategoryId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl Display for CategoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A budgeted spending category.
///
/// `icon` and `color` are opaque tokens that a presentation layer resolves to its own resources.
/// A category without an `id` has not been stored yet; inserting it allocates one.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Category {
    id: Option<CategoryId>,
    name: String,
    icon: String,
    color: String,
    budget: Amount,
}

impl Category {
    pub fn new(
        name: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
        budget: Amount,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            icon: icon.into(),
            color: color.into(),
            budget,
        }
    }

    /// Returns a copy of this category that targets `id` when inserted.
    pub fn with_id(mut self, id: CategoryId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<CategoryId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn budget(&self) -> Amount {
        self.budget
    }
}

/// (name, icon, color, budget in dollars)
const DEFAULT_CATEGORIES: [(&str, &str, &str, i64); 8] = [
    ("Food", "diet", "category_food", 500),
    ("Transportation", "delivery", "category_transport", 300),
    ("Entertainment", "online_gaming", "category_entertainment", 200),
    ("Shopping", "shopping_cart", "category_shopping", 400),
    ("Bills", "bill", "category_bills", 1000),
    ("Health", "cardiogram", "category_health", 300),
    ("Education", "learning", "category_education", 500),
    ("Other", "menu", "category_other", 200),
];

/// The categories that an empty store is seeded with.
pub fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|&(name, icon, color, dollars)| {
            Category::new(name, icon, color, Amount::from_cents(dollars * 100))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_categories() {
        let defaults = default_categories();
        assert_eq!(defaults.len(), 8);
        assert!(defaults.iter().all(|c| c.id().is_none()));
        let food = &defaults[0];
        assert_eq!(food.name(), "Food");
        assert_eq!(food.icon(), "diet");
        assert_eq!(food.color(), "category_food");
        assert_eq!(food.budget(), Amount::from_cents(50_000));
        let total: Amount = defaults.iter().map(|c| c.budget()).sum();
        assert_eq!(total, Amount::from_cents(340_000));
    }

    #[test]
    fn test_with_id() {
        let category = Category::new("Pets", "paw", "category_pets", Amount::ZERO)
            .with_id(CategoryId::new(42));
        assert_eq!(category.id(), Some(CategoryId::new(42)));
    }
}
