use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// All dishes served by one outlet, in API order.
pub type Menu = Vec<Dish>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dish {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub prices: Prices,
    #[serde(default)]
    pub allergens: Vec<u8>,
}

/// Prices in whole crowns per customer group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prices {
    pub student: Option<u32>,
    pub staff: Option<u32>,
    #[serde(rename = "external")]
    pub public: Option<u32>,
}

/// Allergen numbers defined by EU regulation 1169/2011.
const MAX_ALLERGEN: u8 = 14;

impl Dish {
    /// Check a decoded dish for values the API should never send.
    pub fn validate(&self) -> Result<(), ErrorKind> {
        if self.name.trim().is_empty() {
            return Err(ErrorKind::Payload(format!("dish {} has no name", self.id)));
        }
        if let Some(bad) = self.allergens.iter().find(|&&a| a == 0 || a > MAX_ALLERGEN) {
            return Err(ErrorKind::Payload(format!(
                "dish {} lists unknown allergen {}",
                self.id, bad
            )));
        }
        Ok(())
    }

    pub fn category_display(&self) -> &str {
        self.category.as_deref().unwrap_or("Other")
    }

    pub fn allergens_display(&self) -> String {
        self.allergens
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Prices {
    pub fn student_display(&self) -> String {
        format_price(self.student)
    }

    pub fn staff_display(&self) -> String {
        format_price(self.staff)
    }

    pub fn public_display(&self) -> String {
        format_price(self.public)
    }
}

fn format_price(price: Option<u32>) -> String {
    match price {
        Some(p) => format!("{} Kč", p),
        None => "-".to_string(),
    }
}

/// Group dishes by category, keeping categories in order of first appearance.
pub fn group_by_category(menu: &[Dish]) -> Vec<(&str, Vec<&Dish>)> {
    let mut groups: Vec<(&str, Vec<&Dish>)> = Vec::new();
    for dish in menu {
        let category = dish.category_display();
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, dishes)) => dishes.push(dish),
            None => groups.push((category, vec![dish])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dish(id: u64, name: &str, category: Option<&str>) -> Dish {
        Dish {
            id,
            name: name.to_string(),
            category: category.map(str::to_string),
            prices: Prices::default(),
            allergens: vec![],
        }
    }

    #[test]
    fn test_parse_dish() {
        let json = r#"{"id": 17, "name": "Svíčková", "category": "Main", "prices": {"student": 42, "staff": 60, "external": 95}, "allergens": [1, 7]}"#;
        let parsed: Dish = serde_json::from_str(json).expect("Failed to parse dish test JSON");
        assert_eq!(parsed.prices.public, Some(95));
        assert_eq!(parsed.prices.student_display(), "42 Kč");
        assert_eq!(parsed.allergens_display(), "1, 7");
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_dishes() {
        assert!(dish(1, "  ", None).validate().is_err());

        let mut bad_allergen = dish(2, "Soup", None);
        bad_allergen.allergens = vec![3, 15];
        assert!(matches!(bad_allergen.validate(), Err(ErrorKind::Payload(_))));
    }

    #[test]
    fn test_group_by_category_keeps_order() {
        let menu = vec![
            dish(1, "Soup", Some("Soups")),
            dish(2, "Schnitzel", Some("Main")),
            dish(3, "Broth", Some("Soups")),
            dish(4, "Water", None),
        ];
        let groups = group_by_category(&menu);
        let names: Vec<_> = groups.iter().map(|(c, d)| (*c, d.len())).collect();
        assert_eq!(names, vec![("Soups", 2), ("Main", 1), ("Other", 1)]);
    }

    #[test]
    fn test_missing_price_display() {
        assert_eq!(Prices::default().staff_display(), "-");
    }
}
