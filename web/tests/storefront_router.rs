//! End-to-end router behaviour: gated writes, cached reads, paged listings.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Method, Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storefront_core::cache::ProductKey;
use storefront_core::{CacheRepository, Config, CursorPage, read_through};
use storefront_testing::InMemoryKeyValueStore;
use storefront_web::{handlers, ActorId, AppError, AppState, IdempotencyLayer, PageParams};
use tower::ServiceExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetail {
    id: u64,
    name: String,
}

/// Stand-in for the relational store: ids 1..=5, counted lookups.
#[derive(Default)]
struct Catalog {
    lookups: AtomicUsize,
    orders: AtomicUsize,
}

impl Catalog {
    const IDS: [u64; 5] = [5, 4, 3, 2, 1];

    fn find(&self, id: u64) -> Result<Option<ProductDetail>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Self::IDS.contains(&id).then(|| ProductDetail {
            id,
            name: format!("Product {id}"),
        }))
    }

    /// Descending ids starting at `cursor`, at most `limit` rows.
    fn list(&self, cursor: Option<u64>, limit: usize) -> Vec<ProductDetail> {
        Self::IDS
            .iter()
            .filter(|id| cursor.is_none_or(|c| **id <= c))
            .take(limit)
            .map(|&id| ProductDetail {
                id,
                name: format!("Product {id}"),
            })
            .collect()
    }
}

type Store = InMemoryKeyValueStore;

fn router(catalog: Arc<Catalog>) -> (Router, Arc<Store>) {
    let store = Arc::new(Store::new());
    let state = AppState::new(Arc::clone(&store), Config::default());
    let products: CacheRepository<Store, ProductKey, ProductDetail> =
        CacheRepository::products(Arc::clone(&store), state.config.cache.product_ttl());

    let detail_catalog = Arc::clone(&catalog);
    let list_catalog = Arc::clone(&catalog);
    let order_catalog = catalog;

    let api = Router::new()
        .route(
            "/api/products/:id",
            get(
                move |State(state): State<AppState<Store>>, Path(id): Path<u64>| {
                    let catalog = Arc::clone(&detail_catalog);
                    let products = products.clone();
                    async move {
                        let detail = read_through(&products, &ProductKey(id), || async {
                            catalog.find(id)
                        })
                        .await?
                        .ok_or_else(|| AppError::not_found("Product", id))?;
                        state.views.increment(id, 1).await;
                        Ok::<_, AppError>(Json(detail))
                    }
                },
            ),
        )
        .route(
            "/api/products",
            get(move |PageParams(request): PageParams| {
                let catalog = Arc::clone(&list_catalog);
                async move {
                    let rows = catalog.list(request.cursor(), request.fetch_limit());
                    Json(request.paginate(rows, |p| p.id))
                }
            }),
        )
        .route(
            "/api/orders",
            post(move |actor: ActorId, body: String| {
                let catalog = Arc::clone(&order_catalog);
                async move {
                    catalog.orders.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::CREATED, format!("{}:{body}", actor.0))
                }
            }),
        )
        .layer(IdempotencyLayer::from_state(&state));

    let app = api
        .merge(handlers::operational_routes())
        .with_state(state);
    (app, store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn order_request(actor: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/orders")
        .header("X-Actor-Id", actor)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn product_detail_is_cached_and_views_counted() {
    let catalog = Arc::new(Catalog::default());
    let (app, store) = router(Arc::clone(&catalog));

    for _ in 0..3 {
        let (status, json) = send(&app, get_request("/api/products/4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Product 4");
    }

    assert_eq!(catalog.lookups.load(Ordering::SeqCst), 1);
    assert!(store.contains_key("product:4"));
    assert_eq!(
        storefront_core::KeyValueStore::get(store.as_ref(), "product:4:views")
            .await
            .unwrap()
            .as_deref(),
        Some("3")
    );
}

#[tokio::test]
async fn missing_product_is_404_and_not_cached() {
    let catalog = Arc::new(Catalog::default());
    let (app, store) = router(Arc::clone(&catalog));

    let (status, json) = send(&app, get_request("/api/products/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");

    send(&app, get_request("/api/products/99")).await;
    assert_eq!(catalog.lookups.load(Ordering::SeqCst), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn listing_walks_every_page_once() {
    let (app, _) = router(Arc::new(Catalog::default()));

    let (status, first) = send(&app, get_request("/api/products?size=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["content"].as_array().unwrap().len(), 2);
    assert_eq!(first["hasNext"], true);
    assert_eq!(first["nextCursorId"], 3);

    let (_, second) = send(&app, get_request("/api/products?size=2&cursor=3")).await;
    let ids: Vec<u64> = second["content"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2]);
    assert_eq!(second["nextCursorId"], 1);

    let (_, last) = send(&app, get_request("/api/products?size=2&cursor=1")).await;
    let page: CursorPage<ProductDetail> = serde_json::from_value(last).unwrap();
    assert_eq!(page.len(), 1);
    assert!(!page.has_next);
    assert_eq!(page.next_cursor_id, None);
}

#[tokio::test]
async fn listing_rejects_invalid_size() {
    let (app, _) = router(Arc::new(Catalog::default()));

    let (status, json) = send(&app, get_request("/api/products?size=0")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn duplicate_order_is_rejected() {
    storefront_testing::init_test_tracing();
    let catalog = Arc::new(Catalog::default());
    let (app, _) = router(Arc::clone(&catalog));

    let (first, _) = send(&app, order_request("7", r#"{"productId":4}"#)).await;
    let (second, json) = send(&app, order_request("7", r#"{"productId":4}"#)).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "DUPLICATE_REQUEST");
    assert_eq!(catalog.orders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_duplicate_orders_admit_one() {
    let catalog = Arc::new(Catalog::default());
    let (app, _) = router(Arc::clone(&catalog));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(order_request("7", r#"{"productId":1}"#))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::CREATED {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(catalog.orders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn health_endpoints() {
    let (app, _) = router(Arc::new(Catalog::default()));

    let (live, _) = send(&app, get_request("/health")).await;
    let (ready, json) = send(&app, get_request("/health/ready")).await;
    let (metrics, _) = send(&app, get_request("/metrics")).await;

    assert_eq!(live, StatusCode::OK);
    assert_eq!(ready, StatusCode::OK);
    assert_eq!(json["status"], "ready");
    assert_eq!(metrics, StatusCode::NOT_FOUND);
}
