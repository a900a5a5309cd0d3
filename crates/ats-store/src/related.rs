//! Related-product ranking.
//!
//! Candidates are scored against the product being viewed on up to four
//! weighted criteria; the score is normalized to 0–100 over the criteria
//! that are enabled.

use std::collections::HashSet;
use std::time::Duration;

use ats_core::Product;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const CATEGORY_WEIGHT: f64 = 40.0;
const CATEGORY_PARTIAL: f64 = 15.0;
const SUBCATEGORY_WEIGHT: f64 = 30.0;
const SUBCATEGORY_PARTIAL: f64 = 10.0;
const PRICE_WEIGHT: f64 = 20.0;
const PRICE_SAME_TIER: f64 = 5.0;
const BRAND_WEIGHT: f64 = 10.0;
const BRAND_BONUS_CAP: f64 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RelatedConfig {
    pub max_products: usize,
    pub include_categories: bool,
    pub include_subcategories: bool,
    pub include_price_range: bool,
    pub include_brand: bool,
    /// Fraction of the current price within which candidates earn a
    /// proximity score.
    pub price_tolerance: f64,
    pub cache_ttl: Duration,
}

impl Default for RelatedConfig {
    fn default() -> Self {
        Self {
            max_products: 8,
            include_categories: true,
            include_subcategories: true,
            include_price_range: true,
            include_brand: false,
            price_tolerance: 0.3,
            cache_ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    Budget,
    Standard,
    MidRange,
    Premium,
}

impl PriceTier {
    #[must_use]
    pub fn of(price: Decimal) -> Self {
        if price >= Decimal::from(1000) {
            PriceTier::Premium
        } else if price >= Decimal::from(500) {
            PriceTier::MidRange
        } else if price >= Decimal::from(200) {
            PriceTier::Standard
        } else {
            PriceTier::Budget
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
    pub product: Product,
    pub score: f64,
}

/// True when any whitespace-separated word of `a` contains, or is contained
/// in, a word of `b` (case-insensitive).
fn words_overlap(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.split_whitespace().any(|word| {
        b.split_whitespace()
            .any(|other| other.contains(word) || word.contains(other))
    })
}

fn price_score(candidate: Decimal, current: Decimal, tolerance: f64) -> f64 {
    let current_f = current.to_f64().unwrap_or(0.0);
    let candidate_f = candidate.to_f64().unwrap_or(0.0);
    let window = current_f * tolerance;
    let distance = (candidate_f - current_f).abs();

    if window > 0.0 && distance <= window {
        PRICE_WEIGHT * (1.0 - distance / window)
    } else if window <= 0.0 && distance < f64::EPSILON {
        PRICE_WEIGHT
    } else if PriceTier::of(candidate) == PriceTier::of(current) {
        PRICE_SAME_TIER
    } else {
        0.0
    }
}

fn brand_score(candidate: &Product, current: &Product) -> f64 {
    if candidate.model == current.model {
        return BRAND_WEIGHT;
    }
    let mut bonus = 0.0;
    if candidate.size == current.size {
        bonus += 3.0;
    }
    if candidate.subcategory_level == current.subcategory_level {
        bonus += 3.0;
    }
    if candidate.wholesale == current.wholesale {
        bonus += 2.0;
    }
    if candidate.is_in_stock() == current.is_in_stock() {
        bonus += 2.0;
    }
    f64::min(bonus, BRAND_BONUS_CAP)
}

/// Similarity of `candidate` to `current`, from 0 to 100.
#[must_use]
pub fn similarity(candidate: &Product, current: &Product, config: &RelatedConfig) -> f64 {
    let mut score = 0.0;
    let mut max_score = 0.0;

    if config.include_categories {
        max_score += CATEGORY_WEIGHT;
        if candidate.category == current.category {
            score += CATEGORY_WEIGHT;
        } else if words_overlap(&current.category, &candidate.category) {
            score += CATEGORY_PARTIAL;
        }
    }

    if config.include_subcategories {
        max_score += SUBCATEGORY_WEIGHT;
        if candidate.subcategory == current.subcategory {
            score += SUBCATEGORY_WEIGHT;
        } else if words_overlap(&current.subcategory, &candidate.subcategory) {
            score += SUBCATEGORY_PARTIAL;
        }
    }

    if config.include_price_range {
        max_score += PRICE_WEIGHT;
        score += price_score(candidate.base_price, current.base_price, config.price_tolerance);
    }

    if config.include_brand {
        max_score += BRAND_WEIGHT;
        score += brand_score(candidate, current);
    }

    if max_score > 0.0 {
        score / max_score * 100.0
    } else {
        0.0
    }
}

/// Ranks `candidates` by similarity to `current` and keeps the best
/// `config.max_products`. The current product is never included. Ties keep
/// candidate order.
#[must_use]
pub fn rank_related(
    current: &Product,
    candidates: &[Product],
    config: &RelatedConfig,
) -> Vec<ScoredProduct> {
    let mut scored: Vec<ScoredProduct> = candidates
        .iter()
        .filter(|p| p.id != current.id)
        .map(|p| ScoredProduct {
            score: similarity(p, current, config),
            product: p.clone(),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(config.max_products);
    scored
}

/// Appends the products of `extra` whose ids are not already in `primary`.
#[must_use]
pub fn merge_candidates(mut primary: Vec<Product>, extra: Vec<Product>) -> Vec<Product> {
    let mut seen: HashSet<i64> = primary.iter().map(|p| p.id).collect();
    primary.extend(extra.into_iter().filter(|p| seen.insert(p.id)));
    primary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, category: &str, sub: &str, price: i64) -> Product {
        Product {
            id,
            category: category.to_owned(),
            subcategory: sub.to_owned(),
            base_price: Decimal::from(price),
            stock: "Con Stock".to_owned(),
            ..Product::default()
        }
    }

    #[test]
    fn identical_attributes_score_full_marks() {
        let current = product(1, "WHISKY", "Escocés", 500);
        let twin = product(2, "WHISKY", "Escocés", 500);
        let score = similarity(&twin, &current, &RelatedConfig::default());
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn partial_word_overlap_earns_bonus() {
        let current = product(1, "WHISKY", "Whisky Escocés", 500);
        let candidate = product(2, "WHISKY IRLANDES", "Escocés Single Malt", 5000);
        // 15 (category) + 10 (subcategory) + 0 (price) out of 90
        let score = similarity(&candidate, &current, &RelatedConfig::default());
        assert!((score - 25.0 / 90.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn price_proximity_is_linear_within_tolerance() {
        assert!((price_score(Decimal::from(115), Decimal::from(100), 0.3) - 10.0).abs() < 1e-9);
        assert!((price_score(Decimal::from(100), Decimal::from(100), 0.3) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn same_tier_outside_tolerance_earns_small_bonus() {
        assert!((price_score(Decimal::from(1900), Decimal::from(1000), 0.3) - 5.0).abs() < 1e-9);
        assert!(price_score(Decimal::from(150), Decimal::from(1000), 0.3).abs() < 1e-9);
    }

    #[test]
    fn zero_priced_products_do_not_produce_nan() {
        let score = price_score(Decimal::ZERO, Decimal::ZERO, 0.3);
        assert!((score - 20.0).abs() < 1e-9);
    }

    #[test]
    fn price_tiers() {
        assert_eq!(PriceTier::of(Decimal::from(1000)), PriceTier::Premium);
        assert_eq!(PriceTier::of(Decimal::from(500)), PriceTier::MidRange);
        assert_eq!(PriceTier::of(Decimal::from(200)), PriceTier::Standard);
        assert_eq!(PriceTier::of(Decimal::from(199)), PriceTier::Budget);
    }

    #[test]
    fn brand_bonus_is_capped() {
        let config = RelatedConfig {
            include_categories: false,
            include_subcategories: false,
            include_price_range: false,
            include_brand: true,
            ..RelatedConfig::default()
        };
        let mut current = product(1, "RON", "Añejo", 100);
        current.model = "A".to_owned();
        let mut candidate = current.clone();
        candidate.id = 2;
        candidate.model = "B".to_owned();

        assert!((similarity(&candidate, &current, &config) - 80.0).abs() < 1e-9);
        candidate.model = "A".to_owned();
        assert!((similarity(&candidate, &current, &config) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_excludes_self_and_truncates() {
        let current = product(1, "VODKA", "Importado", 300);
        let candidates = vec![
            product(1, "VODKA", "Importado", 300),
            product(2, "RON", "Añejo", 2000),
            product(3, "VODKA", "Importado", 310),
            product(4, "VODKA", "Nacional", 300),
        ];
        let config = RelatedConfig {
            max_products: 2,
            ..RelatedConfig::default()
        };

        let ids: Vec<i64> = rank_related(&current, &candidates, &config)
            .iter()
            .map(|s| s.product.id)
            .collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn merge_skips_known_ids() {
        let merged = merge_candidates(
            vec![product(1, "A", "", 1), product(2, "A", "", 1)],
            vec![product(2, "B", "", 1), product(3, "B", "", 1)],
        );
        let ids: Vec<i64> = merged.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(merged[1].category, "A");
    }
}
