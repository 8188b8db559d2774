//! SeaORM entities for the storefront schema.

pub mod banner;
pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
pub mod rating;
pub mod recommendation;
pub mod session;
pub mod user;
pub mod weekly_promotion;
pub mod wishlist;
