//! Property-based tests for pricing and cart invariants.

mod common;

use chrono::{Duration, NaiveDate};
use common::TestApp;
use proptest::prelude::*;
use rust_decimal::Decimal;
use storefront_api::{
    entities::weekly_promotion,
    services::pricing::{apply_discount, is_active, select_promotion, PromotionPolicy},
};

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn percentage_strategy() -> impl Strategy<Value = Decimal> {
    (-5_000i64..15_000).prop_map(|basis_points| Decimal::new(basis_points, 2))
}

fn promotion_strategy() -> impl Strategy<Value = Vec<weekly_promotion::Model>> {
    prop::collection::vec((-10i64..10, 0i64..10, 0i64..=100), 0..8).prop_map(|windows| {
        let base = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        windows
            .into_iter()
            .enumerate()
            .map(|(idx, (offset, length, pct))| weekly_promotion::Model {
                id: idx as i32 + 1,
                product_id: 1,
                start_date: base + Duration::days(offset),
                end_date: base + Duration::days(offset + length),
                discount_percentage: Decimal::from(pct),
            })
            .collect()
    })
}

fn policy_strategy() -> impl Strategy<Value = PromotionPolicy> {
    prop_oneof![
        Just(PromotionPolicy::HighestDiscount),
        Just(PromotionPolicy::LatestStart),
    ]
}

proptest! {
    #[test]
    fn discounted_price_stays_within_bounds(price in price_strategy(), pct in percentage_strategy()) {
        let discounted = apply_discount(price, pct);
        prop_assert!(discounted >= Decimal::ZERO);
        prop_assert!(discounted <= price);
        prop_assert!(discounted.scale() <= 2);
    }

    #[test]
    fn zero_percent_is_identity(price in price_strategy()) {
        prop_assert_eq!(apply_discount(price, Decimal::ZERO), price);
    }

    #[test]
    fn selected_promotion_is_active_and_order_independent(
        promotions in promotion_strategy(),
        policy in policy_strategy(),
        day_offset in -12i64..22,
    ) {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap() + Duration::days(day_offset);
        let forward = select_promotion(&promotions, policy, today).map(|p| p.id);

        let mut reversed = promotions.clone();
        reversed.reverse();
        let backward = select_promotion(&reversed, policy, today).map(|p| p.id);

        prop_assert_eq!(forward, backward);
        match forward {
            Some(id) => {
                let chosen = promotions.iter().find(|p| p.id == id).unwrap();
                prop_assert!(is_active(chosen, today));
            }
            None => prop_assert!(promotions.iter().all(|p| !is_active(p, today))),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn repeated_adds_keep_one_line_per_product(adds in 1usize..6, units in 1i64..100_000) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (lines, quantity, total, price) = runtime.block_on(async {
            let app = TestApp::new().await;
            let user_id = app.seed_user("prop@example.com", &[]).await;
            let product_id = app
                .seed_product("Prop Widget", Decimal::from(units))
                .await;
            let cart = &app.state.services.cart;

            let mut last = None;
            for _ in 0..adds {
                last = Some(cart.add_line(user_id, product_id).await.unwrap());
            }
            let line = last.unwrap();
            (
                cart.count_lines(user_id).await.unwrap(),
                line.quantity,
                line.total,
                line.price,
            )
        });

        prop_assert_eq!(lines, 1);
        prop_assert_eq!(quantity as usize, adds);
        prop_assert_eq!(total, price * Decimal::from(adds as i64));
    }
}
