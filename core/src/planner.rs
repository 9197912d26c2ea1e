use anyhow::{Result, bail};

use crate::models::{Meal, MealSlot};

/// Share of the daily target each slot aims for.
const SLOT_SHARES: [(MealSlot, f64); 3] = [
    (MealSlot::Breakfast, 0.30),
    (MealSlot::Lunch, 0.40),
    (MealSlot::Dinner, 0.30),
];

/// Serving multipliers tried for every meal: 0.5, 1.0, ... 3.0.
const SERVING_STEPS: [f64; 6] = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0];

#[derive(Debug, Clone)]
pub struct SelectedMeal {
    pub meal: Meal,
    pub serving: f64,
}

impl SelectedMeal {
    #[must_use]
    pub fn calories(&self) -> f64 {
        self.meal.calories * self.serving
    }
}

/// One meal per slot, as returned by a [`MealSelector`].
#[derive(Debug, Clone)]
pub struct DietSelection {
    pub breakfast: SelectedMeal,
    pub lunch: SelectedMeal,
    pub dinner: SelectedMeal,
}

impl DietSelection {
    #[must_use]
    pub fn slots(&self) -> [(MealSlot, &SelectedMeal); 3] {
        [
            (MealSlot::Breakfast, &self.breakfast),
            (MealSlot::Lunch, &self.lunch),
            (MealSlot::Dinner, &self.dinner),
        ]
    }

    #[must_use]
    pub fn total_calories(&self) -> f64 {
        self.slots().iter().map(|(_, m)| m.calories()).sum()
    }
}

/// Picks the meals that make up a user's diet for a calorie target.
pub trait MealSelector: Send {
    fn select(&self, catalog: &[Meal], target_calories: i64) -> Result<DietSelection>;
}

/// Chooses, per slot, the catalog meal and serving closest to that slot's
/// share of the target. Ties go to the lower meal id, then the smaller serving.
#[derive(Debug, Default, Clone, Copy)]
pub struct CatalogMealSelector;

impl CatalogMealSelector {
    fn pick(catalog: &[Meal], slot: MealSlot, slot_target: f64) -> Result<SelectedMeal> {
        let mut best: Option<(f64, &Meal, f64)> = None;
        for meal in catalog.iter().filter(|m| m.label == slot) {
            for serving in SERVING_STEPS {
                let diff = (meal.calories * serving - slot_target).abs();
                let better = match best {
                    None => true,
                    Some((best_diff, best_meal, best_serving)) => {
                        diff < best_diff
                            || ((diff - best_diff).abs() < f64::EPSILON
                                && (meal.id, serving) < (best_meal.id, best_serving))
                    }
                };
                if better {
                    best = Some((diff, meal, serving));
                }
            }
        }
        match best {
            Some((_, meal, serving)) => Ok(SelectedMeal {
                meal: meal.clone(),
                serving,
            }),
            None => bail!("No {} meals available in the catalog", slot.as_str()),
        }
    }
}

impl MealSelector for CatalogMealSelector {
    #[allow(clippy::cast_precision_loss)]
    fn select(&self, catalog: &[Meal], target_calories: i64) -> Result<DietSelection> {
        if target_calories <= 0 {
            bail!("Calorie target must be greater than 0");
        }
        let target = target_calories as f64;
        let [breakfast, lunch, dinner] =
            SLOT_SHARES.map(|(slot, share)| Self::pick(catalog, slot, target * share));
        Ok(DietSelection {
            breakfast: breakfast?,
            lunch: lunch?,
            dinner: dinner?,
        })
    }
}
