use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product. Read-only from the cart and checkout paths.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub category_id: Option<i32>,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    /// JSON array of image URLs; the first one is the thumbnail.
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn image_list(&self) -> Vec<String> {
        self.images
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn thumbnail(&self) -> Option<String> {
        self.image_list().into_iter().next()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::weekly_promotion::Entity")]
    WeeklyPromotion,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::weekly_promotion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WeeklyPromotion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
