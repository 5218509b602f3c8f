use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to parse category table TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("category table is empty")]
    Empty,
}

/// One expense category: the keywords that suggest it and the vendors that
/// imply it outright.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CategoryDef {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub vendors: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// The full category table. `BTreeMap` keeps iteration order stable, which
/// keeps tie-breaks in scoring deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTable {
    #[serde(flatten)]
    pub categories: BTreeMap<String, CategoryDef>,
}

impl CategoryTable {
    pub fn from_toml(content: &str) -> Result<Self, TableError> {
        let table: CategoryTable = toml::from_str(content)?;
        if table.categories.is_empty() {
            return Err(TableError::Empty);
        }
        Ok(table)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Flattened lowercase vendor-alias → category mapping.
    pub fn vendor_mappings(&self) -> BTreeMap<String, String> {
        let mut mappings = BTreeMap::new();
        for (category, def) in &self.categories {
            for vendor in &def.vendors {
                mappings.insert(vendor.to_lowercase(), category.clone());
            }
        }
        mappings
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        fn def(keywords: &[&str], vendors: &[&str], description: &str) -> CategoryDef {
            CategoryDef {
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                vendors: vendors.iter().map(|s| s.to_string()).collect(),
                description: description.to_string(),
            }
        }

        let mut categories = BTreeMap::new();
        categories.insert(
            "Office Supplies".to_string(),
            def(
                &["paper", "pen", "pencil", "stapler", "folder", "binder", "supplies"],
                &["staples", "office depot"],
                "General office supplies and materials",
            ),
        );
        categories.insert(
            "Meals & Entertainment".to_string(),
            def(
                &["restaurant", "food", "lunch", "dinner", "coffee", "catering", "cafe", "pizza"],
                &["mcdonalds", "starbucks", "subway", "dominos"],
                "Business meals and entertainment expenses",
            ),
        );
        categories.insert(
            "Travel".to_string(),
            def(
                &["hotel", "flight", "airline", "uber", "taxi", "gas", "parking"],
                &["hilton", "marriott", "delta", "united", "shell", "exxon", "bp"],
                "Travel and transportation expenses",
            ),
        );
        categories.insert(
            "Technology".to_string(),
            def(
                &["computer", "software", "laptop", "phone", "tablet", "tech"],
                &["apple", "microsoft", "amazon", "best buy"],
                "Technology equipment and software",
            ),
        );
        categories.insert(
            "Groceries".to_string(),
            def(
                &["grocery", "produce", "market", "bakery"],
                &["walmart", "whole foods", "kroger", "safeway"],
                "Grocery and household purchases",
            ),
        );
        categories.insert(
            "Marketing".to_string(),
            def(
                &["advertising", "marketing", "promotion", "print", "design"],
                &["facebook", "google", "adobe"],
                "Marketing and advertising expenses",
            ),
        );
        categories.insert(
            "Utilities".to_string(),
            def(
                &["electric", "water", "internet", "utility"],
                &["verizon", "att", "comcast"],
                "Utility bills and services",
            ),
        );
        categories.insert(
            "Professional Services".to_string(),
            def(
                &["consultant", "legal", "accounting", "professional", "service"],
                &["law", "cpa", "consulting"],
                "Professional services and consulting",
            ),
        );
        categories.insert(
            "Miscellaneous".to_string(),
            def(&["misc", "other", "various"], &[], "Other business expenses"),
        );

        CategoryTable { categories }
    }
}
