mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use storefront_api::{entities::order_item, entities::product, errors::ServiceError};

#[tokio::test]
async fn test_first_add_creates_line_at_resolved_price() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("first-add@example.com", &[]).await;
    let lamp = app.seed_product("Desk Lamp", dec!(100)).await;

    let line = app
        .state
        .services
        .cart
        .add_line(user_id, lamp)
        .await
        .expect("add line");

    assert_eq!(line.user_id, user_id);
    assert_eq!(line.product_id, lamp);
    assert_eq!(line.quantity, 1);
    assert_eq!(line.price, dec!(100));
    assert_eq!(line.total, dec!(100));
    assert!(line.order_id.is_none());
}

#[tokio::test]
async fn test_repeated_adds_merge_into_one_line() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("merge@example.com", &[]).await;
    let mug = app.seed_product("Coffee Mug", dec!(12.50)).await;
    let cart = &app.state.services.cart;

    let first = cart.add_line(user_id, mug).await.unwrap();
    cart.add_line(user_id, mug).await.unwrap();
    let third = cart.add_line(user_id, mug).await.unwrap();

    assert_eq!(third.id, first.id);
    assert_eq!(third.quantity, 3);
    assert_eq!(third.total, dec!(37.50));

    let pending = order_item::Entity::find().count(&*app.state.db).await.unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_add_captures_promotional_price() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("promo@example.com", &[]).await;
    let chair = app.seed_product("Office Chair", dec!(100)).await;
    app.seed_active_promotion(chair, dec!(20)).await;

    let line = app.state.services.cart.add_line(user_id, chair).await.unwrap();

    assert_eq!(line.price, dec!(80));
    assert_eq!(line.total, dec!(80));
}

#[tokio::test]
async fn test_merge_keeps_price_captured_on_first_add() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("keep-price@example.com", &[]).await;
    let kettle = app.seed_product("Kettle", dec!(40)).await;
    let cart = &app.state.services.cart;

    cart.add_line(user_id, kettle).await.unwrap();

    let mut active: product::ActiveModel = product::Entity::find_by_id(kettle)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .into();
    active.price = Set(dec!(55));
    active.update(&*app.state.db).await.unwrap();

    let line = cart.add_line(user_id, kettle).await.unwrap();
    assert_eq!(line.quantity, 2);
    assert_eq!(line.price, dec!(40));
    assert_eq!(line.total, dec!(80));
}

#[tokio::test]
async fn test_lines_are_per_user() {
    let app = TestApp::new().await;
    let alice = app.seed_user("alice@example.com", &[]).await;
    let bob = app.seed_user("bob@example.com", &[]).await;
    let pen = app.seed_product("Pen", dec!(2)).await;
    let cart = &app.state.services.cart;

    let a = cart.add_line(alice, pen).await.unwrap();
    let b = cart.add_line(bob, pen).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(cart.count_lines(alice).await.unwrap(), 1);
    assert_eq!(cart.count_lines(bob).await.unwrap(), 1);
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("ghost@example.com", &[]).await;

    let result = app.state.services.cart.add_line(user_id, 9_999).await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert_eq!(app.state.services.cart.count_lines(user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_quantity_recomputes_total() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("qty@example.com", &[]).await;
    let plate = app.seed_product("Plate", dec!(7.50)).await;
    let cart = &app.state.services.cart;
    cart.add_line(user_id, plate).await.unwrap();

    let line = cart
        .update_quantity(user_id, plate, 4)
        .await
        .unwrap()
        .expect("line kept");

    assert_eq!(line.quantity, 4);
    assert_eq!(line.total, dec!(30));
}

#[tokio::test]
async fn test_zero_quantity_removes_line_and_later_update_is_not_found() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("zero@example.com", &[]).await;
    let bowl = app.seed_product("Bowl", dec!(9)).await;
    let cart = &app.state.services.cart;
    cart.add_line(user_id, bowl).await.unwrap();

    let removed = cart.update_quantity(user_id, bowl, 0).await.unwrap();
    assert!(removed.is_none());
    assert_eq!(cart.count_lines(user_id).await.unwrap(), 0);

    let result = cart.update_quantity(user_id, bowl, 2).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_negative_quantity_is_rejected_and_line_untouched() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("negative@example.com", &[]).await;
    let cup = app.seed_product("Cup", dec!(3)).await;
    let cart = &app.state.services.cart;
    cart.add_line(user_id, cup).await.unwrap();
    cart.add_line(user_id, cup).await.unwrap();

    let result = cart.update_quantity(user_id, cup, -1).await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let lines = cart.list_lines(user_id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
}

#[tokio::test]
async fn test_delete_line_requires_ownership() {
    let app = TestApp::new().await;
    let owner = app.seed_user("owner@example.com", &[]).await;
    let other = app.seed_user("other@example.com", &[]).await;
    let vase = app.seed_product("Vase", dec!(25)).await;
    let cart = &app.state.services.cart;
    let line = cart.add_line(owner, vase).await.unwrap();

    let result = cart.delete_line(line.id, other).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
    assert_eq!(cart.count_lines(owner).await.unwrap(), 1);

    cart.delete_line(line.id, owner).await.unwrap();
    assert_eq!(cart.count_lines(owner).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_lines_joins_product_display_data() {
    let app = TestApp::new().await;
    let user_id = app.seed_user("list@example.com", &[]).await;
    let towel = app.seed_product("Bath Towel", dec!(15)).await;
    let soap = app.seed_product("Soap", dec!(4)).await;
    let cart = &app.state.services.cart;
    cart.add_line(user_id, towel).await.unwrap();
    cart.add_line(user_id, soap).await.unwrap();
    cart.add_line(user_id, soap).await.unwrap();

    let lines = cart.list_lines(user_id).await.unwrap();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].product_name, "Bath Towel");
    assert_eq!(lines[0].image.as_deref(), Some("bath-towel-front.jpg"));
    assert_eq!(lines[1].product_name, "Soap");
    assert_eq!(lines[1].quantity, 2);
    assert_eq!(lines[1].total, dec!(8));
    // lines, not units
    assert_eq!(cart.count_lines(user_id).await.unwrap(), 2);
}
