use crate::{
    entities::{product, weekly_promotion},
    errors::ServiceError,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

/// Decides which promotion applies when several windows cover the same day.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionPolicy {
    /// Largest percentage wins; ties go to the most recent start date.
    #[default]
    HighestDiscount,
    /// Most recently started window wins; ties go to the larger percentage.
    LatestStart,
}

/// Effective price of a product on a given day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub product_id: i32,
    pub base_price: Decimal,
    pub unit_price: Decimal,
    pub promotion_id: Option<i32>,
    pub discount_percentage: Option<Decimal>,
}

impl ResolvedPrice {
    pub fn is_discounted(&self) -> bool {
        self.promotion_id.is_some()
    }
}

pub fn is_active(promotion: &weekly_promotion::Model, today: NaiveDate) -> bool {
    promotion.start_date <= today && today <= promotion.end_date
}

/// Picks the promotion that applies on `today`, if any.
///
/// Final tie-break is the lowest promotion id so the choice never depends on
/// row order.
pub fn select_promotion(
    promotions: &[weekly_promotion::Model],
    policy: PromotionPolicy,
    today: NaiveDate,
) -> Option<&weekly_promotion::Model> {
    promotions
        .iter()
        .filter(|promo| is_active(promo, today))
        .max_by(|a, b| {
            let primary = match policy {
                PromotionPolicy::HighestDiscount => a
                    .discount_percentage
                    .cmp(&b.discount_percentage)
                    .then(a.start_date.cmp(&b.start_date)),
                PromotionPolicy::LatestStart => a
                    .start_date
                    .cmp(&b.start_date)
                    .then(a.discount_percentage.cmp(&b.discount_percentage)),
            };
            primary.then(b.id.cmp(&a.id))
        })
}

/// `price * (1 - percentage / 100)` rounded to cents.
///
/// Percentages outside `0..=100` are clamped so a bad promotion row can never
/// produce a negative or inflated price.
pub fn apply_discount(price: Decimal, percentage: Decimal) -> Decimal {
    let pct = percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let discounted = price * (Decimal::ONE_HUNDRED - pct) / Decimal::ONE_HUNDRED;
    discounted.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Prices a product against a set of candidate promotions.
pub fn price_product(
    product: &product::Model,
    promotions: &[weekly_promotion::Model],
    policy: PromotionPolicy,
    today: NaiveDate,
) -> ResolvedPrice {
    match select_promotion(promotions, policy, today) {
        Some(promo) => ResolvedPrice {
            product_id: product.id,
            base_price: product.price,
            unit_price: apply_discount(product.price, promo.discount_percentage),
            promotion_id: Some(promo.id),
            discount_percentage: Some(promo.discount_percentage),
        },
        None => ResolvedPrice {
            product_id: product.id,
            base_price: product.price,
            unit_price: product.price,
            promotion_id: None,
            discount_percentage: None,
        },
    }
}

/// Resolves the effective unit price of catalog products.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
    policy: PromotionPolicy,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>, policy: PromotionPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> PromotionPolicy {
        self.policy
    }

    /// Unit price a customer pays today for `product_id`.
    ///
    /// # Errors
    ///
    /// * `ServiceError::NotFound` - the product does not exist
    /// * `ServiceError::DatabaseError` - the store could not be read
    #[instrument(skip(self))]
    pub async fn resolve_unit_price(&self, product_id: i32) -> Result<Decimal, ServiceError> {
        self.resolve(product_id, Utc::now().date_naive())
            .await
            .map(|price| price.unit_price)
    }

    /// Full price breakdown for `product_id` on `today`.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        product_id: i32,
        today: NaiveDate,
    ) -> Result<ResolvedPrice, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_product", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

        let promotions = self.active_promotions(&[product_id], today).await?;
        let candidates = promotions.get(&product_id).map(Vec::as_slice).unwrap_or(&[]);

        let resolved = price_product(&product, candidates, self.policy, today);
        debug!(
            product_id,
            base_price = %resolved.base_price,
            unit_price = %resolved.unit_price,
            "resolved unit price"
        );
        Ok(resolved)
    }

    /// Promotions covering `today`, grouped by product, in one query.
    pub async fn active_promotions(
        &self,
        product_ids: &[i32],
        today: NaiveDate,
    ) -> Result<HashMap<i32, Vec<weekly_promotion::Model>>, ServiceError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = weekly_promotion::Entity::find()
            .filter(weekly_promotion::Column::ProductId.is_in(product_ids.iter().copied()))
            .filter(weekly_promotion::Column::StartDate.lte(today))
            .filter(weekly_promotion::Column::EndDate.gte(today))
            .order_by_asc(weekly_promotion::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_promotions", e))?;

        let mut grouped: HashMap<i32, Vec<weekly_promotion::Model>> = HashMap::new();
        for row in rows {
            grouped.entry(row.product_id).or_default().push(row);
        }
        Ok(grouped)
    }
}
