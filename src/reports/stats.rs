//! Derived producer statistics
//!
//! Computed over the resolved roster at read time, never stored. Zero
//! producers yields zeros, not an error.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::schemas::ProducerDoc;

/// Rollup over a producer roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    /// Total producers in scope
    pub nr_cocoa_producers: usize,
    /// Producers with gender "male" and age under 30
    pub nr_young_men: usize,
    /// Producers with gender "female"
    pub nr_women: usize,
    /// Summed forest-conservation hectares
    #[serde(with = "rust_decimal::serde::str")]
    pub ha_forest_conservation: Decimal,
}

impl ProducerStats {
    /// Compute the stats for a roster. Age is `current_year - birth_year`;
    /// producers without a birth year never count as young.
    pub fn compute(producers: &[ProducerDoc], current_year: i32) -> Self {
        let mut nr_young_men = 0;
        let mut nr_women = 0;
        let mut ha_forest_conservation = Decimal::ZERO;

        for producer in producers {
            match producer.gender.as_deref() {
                Some("male") => {
                    if let Some(birth_year) = producer.birth_year {
                        if current_year - birth_year < 30 {
                            nr_young_men += 1;
                        }
                    }
                }
                Some("female") => nr_women += 1,
                _ => {}
            }

            if let Some(ha) = producer.ha_forest_conservation {
                ha_forest_conservation += ha;
            }
        }

        Self {
            nr_cocoa_producers: producers.len(),
            nr_young_men,
            nr_women,
            ha_forest_conservation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn producer(code: &str, gender: &str, birth_year: i32, ha: Decimal) -> ProducerDoc {
        let mut p = ProducerDoc::new(code.into(), code.into(), "Meta".into(), "AsoCampo".into());
        p.gender = Some(gender.into());
        p.birth_year = Some(birth_year);
        p.ha_forest_conservation = Some(ha);
        p
    }

    #[test]
    fn test_empty_roster_is_all_zeros() {
        let stats = ProducerStats::compute(&[], 2026);
        assert_eq!(stats.nr_cocoa_producers, 0);
        assert_eq!(stats.nr_young_men, 0);
        assert_eq!(stats.nr_women, 0);
        assert_eq!(stats.ha_forest_conservation, Decimal::ZERO);
    }

    #[test]
    fn test_age_bracket_and_gender_counts() {
        let roster = vec![
            producer("P-01", "male", 2000, dec!(1.5)),  // 26: young
            producer("P-02", "male", 1990, dec!(2.0)),  // 36: not young
            producer("P-03", "female", 1985, dec!(0.5)),
            producer("P-04", "female", 2001, dec!(3.0)),
        ];
        let stats = ProducerStats::compute(&roster, 2026);
        assert_eq!(stats.nr_cocoa_producers, 4);
        assert_eq!(stats.nr_young_men, 1);
        assert_eq!(stats.nr_women, 2);
        assert_eq!(stats.ha_forest_conservation, dec!(7.0));
    }

    #[test]
    fn test_missing_birth_year_never_young() {
        let mut p = producer("P-01", "male", 2000, dec!(1));
        p.birth_year = None;
        let stats = ProducerStats::compute(&[p], 2026);
        assert_eq!(stats.nr_young_men, 0);
    }

    #[test]
    fn test_boundary_age_is_not_young() {
        // age exactly 30 is outside the bracket
        let p = producer("P-01", "male", 1996, dec!(1));
        let stats = ProducerStats::compute(&[p], 2026);
        assert_eq!(stats.nr_young_men, 0);
    }
}
