mod common;

use ad_click_tracker::domain::repositories::AdRepository;
use ad_click_tracker::infrastructure::persistence::PgAdRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test]
async fn test_fetch_all_ordered_by_id(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool.clone()));

    common::create_test_ad(&pool, "b").await;
    common::create_test_ad(&pool, "a").await;

    let ads = repo.fetch_all().await.unwrap();

    assert_eq!(ads.len(), 2);
    assert_eq!(ads[0].id, "a");
    assert_eq!(ads[1].id, "b");
    assert_eq!(ads[0].image_url, "https://cdn.example/a.png");
}

#[sqlx::test]
async fn test_exists(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool.clone()));

    common::create_test_ad(&pool, "1").await;

    assert!(repo.exists("1").await.unwrap());
    assert!(!repo.exists("2").await.unwrap());
}

#[sqlx::test]
async fn test_exists_with_nul_in_id_is_a_validation_error(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool));

    let result = repo.exists("x\u{0}y").await;

    assert!(matches!(
        result,
        Err(ad_click_tracker::AppError::Validation { .. })
    ));
}

#[sqlx::test]
async fn test_closed_pool_is_a_dependency_error(pool: PgPool) {
    let repo = PgAdRepository::new(Arc::new(pool.clone()));
    pool.close().await;

    let result = repo.exists("1").await;

    assert!(matches!(
        result,
        Err(ad_click_tracker::AppError::Dependency {
            dependency: "postgres",
            ..
        })
    ));
    assert!(!repo.health_check().await);
}
