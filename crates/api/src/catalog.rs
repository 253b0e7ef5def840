//! In-memory plan catalog.
//!
//! Stands in for the plan table; seeded with the three standard plans.

use std::sync::Arc;

use subscribe_common::types::Plan;

#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Arc<Vec<Plan>>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: Arc::new(plans),
        }
    }

    /// Bronze, Silver and Gold at $10, $20 and $30 a month.
    pub fn seeded() -> Self {
        Self::new(
            [("Bronze Plan", 1000), ("Silver Plan", 2000), ("Gold Plan", 3000)]
                .into_iter()
                .enumerate()
                .map(|(i, (name, amount_cents))| Plan {
                    id: i as i64 + 1,
                    name: name.to_string(),
                    amount_cents,
                })
                .collect(),
        )
    }

    pub fn all(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, id: i64) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_plans() {
        let catalog = PlanCatalog::seeded();
        assert_eq!(catalog.all().len(), 3);
        assert_eq!(catalog.get(1).unwrap().name, "Bronze Plan");
        assert_eq!(catalog.get(3).unwrap().amount_for_display(), "$30.00");
        assert!(catalog.get(4).is_none());
    }
}
