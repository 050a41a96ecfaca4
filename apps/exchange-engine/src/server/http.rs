//! HTTP/JSON API server (C6 — external API façade).
//!
//! A thin translation layer: authenticate the `api_key` query parameter,
//! resolve the user, obtain or start that user's engine, invoke one engine
//! operation, and translate the result. This layer owns no business logic
//! of its own — every rule lives in [`crate::matching::Engine`] or
//! [`crate::ledger`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::domain::order_execution::{Order as DomainOrder, OrderSide, OrderType, PlaceOrderRequest};
use crate::domain::shared::{ApiKey, Asset, Money, OrderId, Quantity};
use crate::domain::user::User;
use crate::error::ApiError;
use crate::ledger::AccountBalances;
use crate::manager::ExchangeManager;
use crate::matching::Statistics;
use crate::persistence::UserStore;

/// Shared state for every HTTP handler.
#[derive(Clone)]
pub struct ApiServer {
    manager: Arc<ExchangeManager>,
    users: Arc<dyn UserStore>,
}

impl ApiServer {
    /// Build the façade over a manager and a user store.
    #[must_use]
    pub fn new(manager: Arc<ExchangeManager>, users: Arc<dyn UserStore>) -> Self {
        Self { manager, users }
    }

    async fn resolve_user(&self, api_key: &str) -> Result<User, ApiError> {
        let api_key = ApiKey::new(api_key);
        self.users
            .find_by_api_key(&api_key)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(ApiError::unknown_api_key)
    }
}

/// Build the router exposing every endpoint in the external-interfaces
/// section, wired to `state`.
pub fn create_router(state: ApiServer) -> Router {
    Router::new()
        .route("/auth/generate_api_key", post(generate_api_key))
        .route("/playground/exchange/start_exchange", post(start_exchange))
        .route("/playground/exchange/stop_exchange", post(stop_exchange))
        .route("/playground/exchange/set_multiplier", post(set_multiplier))
        .route(
            "/playground/exchange/trade/place_order",
            post(place_order),
        )
        .route("/playground/exchange/trade/orders", get(list_orders))
        .route("/playground/exchange/trade/orders/{id}", get(get_order))
        .route(
            "/playground/exchange/trade/cancel_order/{id}",
            post(cancel_order),
        )
        .route(
            "/playground/exchange/trade/asset_balance",
            get(asset_balance),
        )
        .route(
            "/playground/exchange/trade/asset_balance/{asset}",
            get(asset_balance_one),
        )
        .route("/playground/exchange/trade/statistics", get(statistics))
        .with_state(state)
}

/// `api_key` carried by every endpoint except the minting one.
#[derive(Debug, Deserialize)]
struct ApiKeyQuery {
    api_key: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiKeyResponse {
    api_key: String,
}

async fn generate_api_key(
    State(state): State<ApiServer>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let user = User::mint();
    state
        .users
        .insert(&user)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(ApiKeyResponse {
        api_key: user.api_key().as_str().to_string(),
    }))
}

async fn start_exchange(
    State(state): State<ApiServer>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    state.manager.start(user.id()).await;
    Ok(Json(MessageResponse {
        message: "exchange started".to_string(),
    }))
}

async fn stop_exchange(
    State(state): State<ApiServer>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    state.manager.stop(user.id()).await;
    Ok(Json(MessageResponse {
        message: "exchange stopped".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct SetMultiplierQuery {
    api_key: String,
    multiplier: f64,
}

async fn set_multiplier(
    State(state): State<ApiServer>,
    Query(q): Query<SetMultiplierQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    state.manager.set_multiplier(user.id(), q.multiplier).await;
    Ok(Json(MessageResponse {
        message: "multiplier updated".to_string(),
    }))
}

/// Wire shape of `POST .../place_order`, per §6. `signal_price` is unique
/// to `OCO` requests and maps to [`PlaceOrderRequest::oco_limit_price`]
/// (the limit leg's price) — `execution_price`/`stop_price` cover the
/// other three order types directly, and for `OCO` supply the stop-limit
/// leg's execution and activation prices.
#[derive(Debug, Deserialize)]
struct PlaceOrderPayload {
    order_type: OrderType,
    quantity: Quantity,
    base_asset: String,
    target_asset: String,
    direction: OrderSide,
    execution_price: Option<Money>,
    stop_price: Option<Money>,
    signal_price: Option<Money>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
}

async fn place_order(
    State(state): State<ApiServer>,
    Query(q): Query<ApiKeyQuery>,
    Json(payload): Json<PlaceOrderPayload>,
) -> Result<Json<PlaceOrderResponse>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;

    let request = PlaceOrderRequest {
        order_type: payload.order_type,
        owner: user.id().clone(),
        base_asset: Asset::new(&payload.base_asset),
        target_asset: Asset::new(&payload.target_asset),
        side: payload.direction,
        quantity: payload.quantity,
        execution_price: payload.execution_price,
        stop_price: payload.stop_price,
        oco_limit_price: payload.signal_price,
    };

    let order_ids = engine.place(request).await.map_err(ApiError::from)?;
    let leading = order_ids
        .first()
        .map(OrderId::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(Json(PlaceOrderResponse { order_id: leading }))
}

#[derive(Debug, Serialize)]
struct OrderView {
    id: String,
    order_type: OrderType,
    base_asset: String,
    target_asset: String,
    direction: OrderSide,
    quantity: Quantity,
}

impl From<&DomainOrder> for OrderView {
    fn from(order: &DomainOrder) -> Self {
        Self {
            id: order.id().as_str().to_string(),
            order_type: order.order_type(),
            base_asset: order.base_asset().as_str().to_string(),
            target_asset: order.target_asset().as_str().to_string(),
            direction: order.side(),
            quantity: order.quantity(),
        }
    }
}

async fn list_orders(
    State(state): State<ApiServer>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;
    let orders = engine.list_orders().await;
    Ok(Json(orders.iter().map(OrderView::from).collect()))
}

async fn get_order(
    State(state): State<ApiServer>,
    Path(id): Path<String>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<OrderView>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;
    let order = engine
        .get_order(OrderId::new(id.clone()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("no such order: {id}")))?;
    Ok(Json(OrderView::from(&order)))
}

async fn cancel_order(
    State(state): State<ApiServer>,
    Path(id): Path<String>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;
    engine
        .cancel(OrderId::new(id))
        .await
        .map_err(ApiError::from)?;
    Ok(Json(MessageResponse {
        message: "order cancelled".to_string(),
    }))
}

#[derive(Debug, Serialize)]
struct BalancesView {
    cash: Money,
    free_cash: Money,
    assets: HashMap<String, Quantity>,
}

impl From<&AccountBalances> for BalancesView {
    fn from(balances: &AccountBalances) -> Self {
        Self {
            cash: balances.cash(),
            free_cash: balances.free_cash(),
            assets: balances
                .assets()
                .iter()
                .map(|(asset, qty)| (asset.as_str().to_string(), *qty))
                .collect(),
        }
    }
}

async fn asset_balance(
    State(state): State<ApiServer>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<BalancesView>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;
    let balances = engine.get_balance().await;
    Ok(Json(BalancesView::from(&balances)))
}

#[derive(Debug, Serialize)]
struct SingleAssetBalance {
    asset: String,
    amount: Quantity,
    free: Quantity,
}

async fn asset_balance_one(
    State(state): State<ApiServer>,
    Path(asset): Path<String>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<SingleAssetBalance>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;
    let balances = engine.get_balance().await;
    let asset = Asset::new(&asset);
    Ok(Json(SingleAssetBalance {
        amount: balances.asset(&asset),
        free: balances.free_asset(&asset),
        asset: asset.as_str().to_string(),
    }))
}

async fn statistics(
    State(state): State<ApiServer>,
    Query(q): Query<ApiKeyQuery>,
) -> Result<Json<Statistics>, ApiError> {
    let user = state.resolve_user(&q.api_key).await?;
    let engine = state.manager.start(user.id()).await;
    Ok(Json(engine.get_statistics().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::Timeframe;
    use crate::ledger::InMemoryBalanceLedger;
    use crate::matching::{ClockConfig, InMemoryCandleStore};
    use crate::persistence::InMemoryUserStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn clock() -> ClockConfig {
        ClockConfig {
            timeframe: Timeframe::OneHour,
            ticks_for_test: 24,
            seed_asset: crate::domain::shared::Asset::new("BTC"),
        }
    }

    fn test_server() -> ApiServer {
        let manager = ExchangeManager::new(
            Arc::new(InMemoryBalanceLedger::new()),
            Arc::new(InMemoryCandleStore::new()),
            Arc::new(crate::persistence::InMemorySnapshotStore::new()),
            clock(),
        );
        ApiServer::new(Arc::new(manager), Arc::new(InMemoryUserStore::new()))
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = match axum::body::to_bytes(response.into_body(), usize::MAX).await {
            Ok(b) => b,
            Err(e) => panic!("should read response body: {e}"),
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => panic!("should parse response body as json: {e}"),
        }
    }

    #[tokio::test]
    async fn generate_api_key_mints_and_persists_a_user() {
        let server = test_server();
        let users = server.users.clone();
        let router = create_router(server);

        let request = match Request::post("/auth/generate_api_key").body(Body::empty()) {
            Ok(r) => r,
            Err(e) => panic!("should build request: {e}"),
        };
        let response = match router.oneshot(request).await {
            Ok(r) => r,
            Err(e) => panic!("should dispatch request: {e}"),
        };
        assert_eq!(response.status(), StatusCode::OK);

        let body: ApiKeyResponse = body_json(response).await;
        let api_key = ApiKey::new(body.api_key);
        let found = match users.find_by_api_key(&api_key).await {
            Ok(f) => f,
            Err(e) => panic!("should look up the minted user: {e}"),
        };
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn unknown_api_key_is_rejected_with_403() {
        let router = create_router(test_server());
        let request = match Request::post("/playground/exchange/start_exchange?api_key=ghost")
            .body(Body::empty())
        {
            Ok(r) => r,
            Err(e) => panic!("should build request: {e}"),
        };
        let response = match router.oneshot(request).await {
            Ok(r) => r,
            Err(e) => panic!("should dispatch request: {e}"),
        };
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn place_order_returns_an_order_id_for_a_known_user() {
        let server = test_server();
        let users = server.users.clone();
        let user = User::mint();
        if let Err(e) = users.insert(&user).await {
            panic!("should insert user: {e}");
        }
        let router = create_router(server);

        let payload = serde_json::json!({
            "order_type": "MARKET",
            "quantity": "1",
            "base_asset": "BTC",
            "target_asset": "USDT",
            "direction": "BUY",
            "execution_price": "30000",
        });
        let request = match Request::post(format!(
            "/playground/exchange/trade/place_order?api_key={}",
            user.api_key().as_str()
        ))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        {
            Ok(r) => r,
            Err(e) => panic!("should build request: {e}"),
        };
        let response = match router.oneshot(request).await {
            Ok(r) => r,
            Err(e) => panic!("should dispatch request: {e}"),
        };
        assert_eq!(response.status(), StatusCode::OK);

        let body: PlaceOrderResponse = body_json(response).await;
        assert!(!body.order_id.is_empty());
    }

    #[tokio::test]
    async fn cancel_order_on_unknown_id_returns_404() {
        let server = test_server();
        let user = User::mint();
        if let Err(e) = server.users.insert(&user).await {
            panic!("should insert user: {e}");
        }
        let router = create_router(server);

        let request = match Request::post(format!(
            "/playground/exchange/trade/cancel_order/ord-ghost?api_key={}",
            user.api_key().as_str()
        ))
        .body(Body::empty())
        {
            Ok(r) => r,
            Err(e) => panic!("should build request: {e}"),
        };
        let response = match router.oneshot(request).await {
            Ok(r) => r,
            Err(e) => panic!("should dispatch request: {e}"),
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
