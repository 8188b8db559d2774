use crate::{
    entities::{
        banner, category, order, order_item, product, rating, recommendation, weekly_promotion,
    },
    errors::ServiceError,
    services::pricing::{price_product, PricingService, ResolvedPrice},
    PaginatedResponse,
};
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr, Order},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

/// Products younger than this are flagged as new.
const NEW_PRODUCT_WINDOW_DAYS: i64 = 30;

/// Live catalog entry with its price resolved for today.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CatalogProduct {
    pub id: i32,
    pub name: String,
    pub category_id: Option<i32>,
    pub thumbnail_image: Option<String>,
    #[schema(value_type = String, example = "100.00")]
    pub price: Decimal,
    #[schema(value_type = Option<String>, example = "20")]
    pub discount_percentage: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "80.00")]
    pub discount_price: Option<Decimal>,
    pub is_new: bool,
    /// Mean rating rounded to two places, zero when unrated.
    #[schema(value_type = String, example = "4.50")]
    pub average_rating: Decimal,
    /// Number of distinct orders containing the product.
    pub sold: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CatalogProductDetail {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub images: Vec<String>,
    #[schema(value_type = String, example = "100.00")]
    pub price: Decimal,
    #[schema(value_type = Option<String>, example = "20")]
    pub discount_percentage: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "80.00")]
    pub discount_price: Option<Decimal>,
    pub is_new: bool,
    #[schema(value_type = String, example = "4.50")]
    pub average_rating: Decimal,
    pub sold: u64,
    pub created_at: DateTime<Utc>,
}

/// Catalog listing filters. `page` is 1-based.
#[derive(Clone, Debug, Default)]
pub struct ProductQuery {
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Aggregates shown next to every product.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ProductStats {
    average_rating: Decimal,
    sold: u64,
}

#[derive(Debug, FromQueryResult)]
struct RatingTotals {
    product_id: i32,
    rating_sum: i64,
    rating_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct SalesCount {
    product_id: i32,
    sold: i64,
}

fn average_rating(sum: i64, count: i64) -> Decimal {
    if count <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(sum) / Decimal::from(count))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Half-open UTC range covering the calendar month of `now`.
fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let first = today - Days::new(u64::from(today.day0()));
    let next = first + Months::new(1);
    (
        first.and_time(NaiveTime::MIN).and_utc(),
        next.and_time(NaiveTime::MIN).and_utc(),
    )
}

fn is_new(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    created_at >= now - Duration::days(NEW_PRODUCT_WINDOW_DAYS)
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn to_catalog_product(
    product: &product::Model,
    price: &ResolvedPrice,
    stats: ProductStats,
    now: DateTime<Utc>,
) -> CatalogProduct {
    CatalogProduct {
        id: product.id,
        name: product.name.clone(),
        category_id: product.category_id,
        thumbnail_image: product.thumbnail(),
        price: price.base_price,
        discount_percentage: price.discount_percentage,
        discount_price: price.is_discounted().then_some(price.unit_price),
        is_new: is_new(product.created_at, now),
        average_rating: stats.average_rating,
        sold: stats.sold,
    }
}

/// Read side of the storefront: products, categories and banners.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    pricing: PricingService,
    default_page_size: u64,
    max_page_size: u64,
}

impl CatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        pricing: PricingService,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        Self {
            db,
            pricing,
            default_page_size,
            max_page_size,
        }
    }

    /// Paginated product listing ordered by id.
    ///
    /// `name` matches case-insensitively anywhere in the product name. Page
    /// and limit are clamped to `1..=max_page_size`.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductQuery,
    ) -> Result<PaginatedResponse<CatalogProduct>, ServiceError> {
        let limit = query
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let page = query.page.unwrap_or(1).max(1);

        let mut condition = Condition::all();
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let pattern = format!("%{}%", escape_like(&name.to_lowercase()));
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }
        if let Some(category_id) = query.category_id {
            condition = condition.add(product::Column::CategoryId.eq(category_id));
        }

        let paginator = product::Entity::find()
            .filter(condition)
            .order_by_asc(product::Column::Id)
            .paginate(&*self.db, limit);

        let totals = paginator
            .num_items_and_pages()
            .await
            .map_err(|e| ServiceError::store("count_products", e))?;
        let products = paginator
            .fetch_page(page - 1)
            .await
            .map_err(|e| ServiceError::store("list_products", e))?;

        let items = self.price_all(&products).await?;

        Ok(PaginatedResponse {
            items,
            total: totals.number_of_items,
            page,
            limit,
            total_pages: totals.number_of_pages,
        })
    }

    /// Product detail with all images and the category name.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i32) -> Result<CatalogProductDetail, ServiceError> {
        let (product, category) = product::Entity::find_by_id(product_id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_product", e))?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

        let today = Utc::now().date_naive();
        let promotions = self.pricing.active_promotions(&[product.id], today).await?;
        let price = price_product(
            &product,
            promotions.get(&product.id).map(Vec::as_slice).unwrap_or(&[]),
            self.pricing.policy(),
            today,
        );
        let stats = self
            .stats_for(&[product.id])
            .await?
            .remove(&product.id)
            .unwrap_or_default();

        Ok(CatalogProductDetail {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            category: category.map(|c| c.name),
            images: product.image_list(),
            price: price.base_price,
            discount_percentage: price.discount_percentage,
            discount_price: price.is_discounted().then_some(price.unit_price),
            is_new: is_new(product.created_at, Utc::now()),
            average_rating: stats.average_rating,
            sold: stats.sold,
            created_at: product.created_at,
        })
    }

    /// Products with a promotion active today.
    #[instrument(skip(self))]
    pub async fn weekly_promotion_products(&self) -> Result<Vec<CatalogProduct>, ServiceError> {
        let today = Utc::now().date_naive();
        self.promoted_on(today).await
    }

    async fn promoted_on(&self, today: NaiveDate) -> Result<Vec<CatalogProduct>, ServiceError> {
        let product_ids: Vec<i32> = weekly_promotion::Entity::find()
            .filter(weekly_promotion::Column::StartDate.lte(today))
            .filter(weekly_promotion::Column::EndDate.gte(today))
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_weekly_promotions", e))?
            .into_iter()
            .map(|promo| promo.product_id)
            .collect();

        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .order_by_asc(product::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_promoted_products", e))?;

        self.price_all(&products).await
    }

    /// Products ordered in the current calendar month, most orders first.
    ///
    /// Ties break on product id. `sold` on each entry counts this month's
    /// orders only; products without an order this month are left out.
    #[instrument(skip(self))]
    pub async fn best_selling_products(
        &self,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<PaginatedResponse<CatalogProduct>, ServiceError> {
        let limit = limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let page = page.unwrap_or(1).max(1);
        let (month_start, month_end) = month_bounds(Utc::now());

        let sold = Expr::col((order_item::Entity, order_item::Column::OrderId)).count_distinct();
        let paginator = order_item::Entity::find()
            .select_only()
            .column(order_item::Column::ProductId)
            .column_as(sold.clone(), "sold")
            .inner_join(order::Entity)
            .filter(order::Column::CreatedAt.gte(month_start))
            .filter(order::Column::CreatedAt.lt(month_end))
            .group_by(order_item::Column::ProductId)
            .order_by(sold, Order::Desc)
            .order_by_asc(order_item::Column::ProductId)
            .into_model::<SalesCount>()
            .paginate(&*self.db, limit);

        let totals = paginator
            .num_items_and_pages()
            .await
            .map_err(|e| ServiceError::store("count_best_sellers", e))?;
        let ranking = paginator
            .fetch_page(page - 1)
            .await
            .map_err(|e| ServiceError::store("rank_best_sellers", e))?;

        let mut products: HashMap<i32, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(ranking.iter().map(|r| r.product_id)))
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_best_sellers", e))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let ordered: Vec<product::Model> = ranking
            .iter()
            .filter_map(|r| products.remove(&r.product_id))
            .collect();

        let monthly: HashMap<i32, u64> = ranking
            .iter()
            .map(|r| (r.product_id, r.sold.max(0) as u64))
            .collect();
        let mut items = self.price_all(&ordered).await?;
        for item in &mut items {
            item.sold = monthly.get(&item.id).copied().unwrap_or_default();
        }

        Ok(PaginatedResponse {
            items,
            total: totals.number_of_items,
            page,
            limit,
            total_pages: totals.number_of_pages,
        })
    }

    /// Staff-picked products ordered by id.
    #[instrument(skip(self))]
    pub async fn recommended_products(&self) -> Result<Vec<CatalogProduct>, ServiceError> {
        let product_ids: Vec<i32> = recommendation::Entity::find()
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_recommendations", e))?
            .into_iter()
            .map(|r| r.product_id)
            .collect();

        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let products = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .order_by_asc(product::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("load_recommended_products", e))?;

        self.price_all(&products).await
    }

    pub async fn categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        category::Entity::find()
            .order_by_asc(category::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("list_categories", e))
    }

    pub async fn banners(&self) -> Result<Vec<banner::Model>, ServiceError> {
        banner::Entity::find()
            .order_by_asc(banner::Column::Id)
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("list_banners", e))
    }

    /// Prices a page of products with a single promotion query.
    async fn price_all(
        &self,
        products: &[product::Model],
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        let now = Utc::now();
        let today = now.date_naive();
        let ids: Vec<i32> = products.iter().map(|p| p.id).collect();
        let promotions: HashMap<i32, Vec<weekly_promotion::Model>> =
            self.pricing.active_promotions(&ids, today).await?;
        let stats = self.stats_for(&ids).await?;

        Ok(products
            .iter()
            .map(|product| {
                let candidates = promotions.get(&product.id).map(Vec::as_slice).unwrap_or(&[]);
                let price = price_product(product, candidates, self.pricing.policy(), today);
                let stats = stats.get(&product.id).copied().unwrap_or_default();
                to_catalog_product(product, &price, stats, now)
            })
            .collect())
    }

    /// Average rating and committed order count for each of `product_ids`.
    async fn stats_for(
        &self,
        product_ids: &[i32],
    ) -> Result<HashMap<i32, ProductStats>, ServiceError> {
        let mut stats: HashMap<i32, ProductStats> = HashMap::new();
        if product_ids.is_empty() {
            return Ok(stats);
        }

        let ratings = rating::Entity::find()
            .select_only()
            .column(rating::Column::ProductId)
            .column_as(Expr::col(rating::Column::Rating).sum(), "rating_sum")
            .column_as(Expr::col(rating::Column::Rating).count(), "rating_count")
            .filter(rating::Column::ProductId.is_in(product_ids.iter().copied()))
            .group_by(rating::Column::ProductId)
            .into_model::<RatingTotals>()
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("aggregate_ratings", e))?;
        for totals in ratings {
            stats.entry(totals.product_id).or_default().average_rating =
                average_rating(totals.rating_sum, totals.rating_count);
        }

        let sales = order_item::Entity::find()
            .select_only()
            .column(order_item::Column::ProductId)
            .column_as(
                Expr::col((order_item::Entity, order_item::Column::OrderId)).count_distinct(),
                "sold",
            )
            .filter(order_item::Column::OrderId.is_not_null())
            .filter(order_item::Column::ProductId.is_in(product_ids.iter().copied()))
            .group_by(order_item::Column::ProductId)
            .into_model::<SalesCount>()
            .all(&*self.db)
            .await
            .map_err(|e| ServiceError::store("count_product_sales", e))?;
        for count in sales {
            stats.entry(count.product_id).or_default().sold = count.sold.max(0) as u64;
        }

        Ok(stats)
    }
}
