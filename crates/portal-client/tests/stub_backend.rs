use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use portal_client::{ApiClient, ApiError, ClientConfig, Portal, Session, SessionPhase};
use portal_core::{
    ContractOfferStatus, NewContractOffer, NewServiceOffer, OfferCost, Role, ServiceOfferStatus,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct Stub {
    access: Mutex<String>,
    refresh_ok: Mutex<bool>,
    role: Mutex<String>,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    last_offer: Mutex<Option<Value>>,
}

type Shared = Arc<Stub>;

fn authorized(headers: &HeaderMap, stub: &Stub) -> bool {
    let expected = format!("Bearer {}", stub.access.lock().unwrap());
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type"})),
    )
        .into_response()
}

fn user_json(stub: &Stub, id: i64) -> Value {
    json!({
        "id": id,
        "email": "ada@example.com",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "role": *stub.role.lock().unwrap()
    })
}

async fn login(State(stub): State<Shared>, Json(body): Json<Value>) -> Response {
    stub.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] == "secret" {
        let access = stub.access.lock().unwrap().clone();
        Json(json!({"access": access, "refresh": "r-1"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response()
    }
}

async fn refresh(State(stub): State<Shared>, Json(body): Json<Value>) -> Response {
    stub.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Slow enough for concurrent callers to pile up behind the refresh.
    tokio::time::sleep(Duration::from_millis(50)).await;
    if body["refresh"] == "r-1" && *stub.refresh_ok.lock().unwrap() {
        let access = stub.access.lock().unwrap().clone();
        Json(json!({"access": access})).into_response()
    } else {
        unauthorized()
    }
}

async fn me(State(stub): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    Json(user_json(&stub, 1)).into_response()
}

async fn get_user(State(stub): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    Json(user_json(&stub, id)).into_response()
}

async fn patch_role(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    *stub.role.lock().unwrap() = body["role"].as_str().unwrap_or_default().to_string();
    Json(json!({"status": "ok"})).into_response()
}

async fn contracts(State(stub): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    Json(json!({
        "count": 2,
        "results": [
            {"id": 1, "title": "Cloud framework", "status": "PUBLISHED"},
            {"id": 2, "title": "Data platform", "status": "Active"}
        ]
    }))
    .into_response()
}

async fn contract(State(stub): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    if id == 99 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    if id == 98 {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
    }
    Json(json!({"id": id, "title": "Cloud framework", "status": "In Negotiation"})).into_response()
}

async fn create_contract_offer(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(mut body): Json<Value>,
) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    body["id"] = json!(501);
    body["contractId"] = json!(id);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn create_service_offer(
    State(stub): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if !authorized(&headers, &stub) {
        return unauthorized();
    }
    *stub.last_offer.lock().unwrap() = Some(body.clone());
    body["id"] = json!(77);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn spawn_stub() -> (String, Shared) {
    let stub = Arc::new(Stub::default());
    *stub.access.lock().unwrap() = "a-1".to_string();
    *stub.refresh_ok.lock().unwrap() = true;
    *stub.role.lock().unwrap() = "Supplier Representative".to_string();

    let app = Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/refresh/", post(refresh))
        .route("/api/auth/me/", get(me))
        .route("/api/users/{id}/", get(get_user))
        .route("/api/users/{id}/role/", patch(patch_role))
        .route("/api/contracts/", get(contracts))
        .route("/api/contracts/{id}/", get(contract))
        .route("/api/contracts/{id}/offers/", post(create_contract_offer))
        .route("/api/service-offers/", post(create_service_offer))
        .with_state(stub.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    (format!("http://{addr}"), stub)
}

fn portal_for(base_url: &str) -> Portal {
    let client = ApiClient::new(&ClientConfig {
        base_url: base_url.to_string(),
        ..ClientConfig::default()
    })
    .expect("client");
    Portal::new(client, Arc::new(Session::in_memory()))
}

async fn signed_in() -> (Portal, Shared) {
    let (base, stub) = spawn_stub().await;
    let portal = portal_for(&base);
    portal.login("ada@example.com", "secret").await.expect("login");
    (portal, stub)
}

#[tokio::test]
async fn login_stores_tokens_and_user() {
    let (portal, _stub) = signed_in().await;
    assert_eq!(portal.session().phase().await, SessionPhase::Authenticated);
    assert_eq!(portal.session().access_token().await.as_deref(), Some("a-1"));
    let user = portal.current_user().await.unwrap();
    assert_eq!(user.display_name(), "Ada Lovelace");
    assert!(user.role_set().can_submit_offers());
}

#[tokio::test]
async fn invalid_email_never_reaches_the_backend() {
    let (base, stub) = spawn_stub().await;
    let portal = portal_for(&base);
    let err = portal.login("ada.example.com", "secret").await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid email format");
    assert_eq!(stub.login_calls.load(Ordering::SeqCst), 0);
    assert_eq!(portal.session().phase().await, SessionPhase::Anonymous);
}

#[tokio::test]
async fn wrong_password_surfaces_backend_detail() {
    let (base, _stub) = spawn_stub().await;
    let portal = portal_for(&base);
    let err = portal.login("ada@example.com", "nope").await.unwrap_err();
    assert_eq!(
        err.user_message(),
        "No active account found with the given credentials"
    );
    assert!(!portal.session().is_authenticated().await);
}

#[tokio::test]
async fn expired_access_token_is_refreshed_once_and_retried() {
    let (portal, stub) = signed_in().await;
    *stub.access.lock().unwrap() = "a-2".to_string();

    let contracts = portal.list_contracts().await.expect("contracts after refresh");
    assert_eq!(contracts.len(), 2);
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(portal.session().access_token().await.as_deref(), Some("a-2"));
    assert_eq!(portal.session().refresh_token().await.as_deref(), Some("r-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let (portal, stub) = signed_in().await;
    *stub.access.lock().unwrap() = "a-2".to_string();

    let calls: Vec<_> = (0..8)
        .map(|_| {
            let portal = portal.clone();
            tokio::spawn(async move { portal.list_contracts().await })
        })
        .collect();
    for call in calls {
        let contracts = call.await.expect("task").expect("contracts after refresh");
        assert_eq!(contracts.len(), 2);
    }
    assert_eq!(stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(portal.session().phase().await, SessionPhase::Authenticated);
    assert_eq!(portal.session().access_token().await.as_deref(), Some("a-2"));
}

#[tokio::test]
async fn failed_refresh_ends_the_session() {
    let (portal, stub) = signed_in().await;
    *stub.access.lock().unwrap() = "a-2".to_string();
    *stub.refresh_ok.lock().unwrap() = false;

    let err = portal.list_contracts().await.unwrap_err();
    assert!(err.is_session_expired());
    assert_eq!(portal.session().phase().await, SessionPhase::Anonymous);
    assert!(portal.session().access_token().await.is_none());
    assert!(matches!(
        portal.list_contracts().await.unwrap_err(),
        ApiError::SessionExpired
    ));
}

#[tokio::test]
async fn http_errors_carry_detail_or_fallback() {
    let (portal, _stub) = signed_in().await;
    let not_found = portal.get_contract(99).await.unwrap_err();
    assert_eq!(not_found.user_message(), "Not found.");
    assert_eq!(not_found.status(), Some(404));

    let broken = portal.get_contract(98).await.unwrap_err();
    assert_eq!(broken.user_message(), "Request failed (HTTP 500)");
}

#[tokio::test]
async fn role_change_is_read_back_with_a_fresh_get() {
    let (portal, _stub) = signed_in().await;
    let user = portal
        .update_user_role(5, Role::ProviderAdmin)
        .await
        .expect("role patch");
    assert_eq!(user.id, 5);
    assert_eq!(user.role, Some(Role::ProviderAdmin));

    let again = portal.get_user(5).await.unwrap();
    assert_eq!(again.role, Some(Role::ProviderAdmin));
}

#[tokio::test]
async fn contract_offer_without_rate_sends_null() {
    let (portal, _stub) = signed_in().await;
    let offer = portal
        .create_contract_offer(
            3,
            &NewContractOffer {
                proposed_daily_rate: None,
                notes: Some("Open to discuss volume discounts".into()),
                status: ContractOfferStatus::Submitted,
            },
        )
        .await
        .expect("contract offer");
    assert_eq!(offer.contract_id, 3);
    assert_eq!(offer.proposed_daily_rate, None);
    assert_eq!(offer.status, ContractOfferStatus::Submitted);
}

#[tokio::test]
async fn service_offer_total_is_sent_as_computed() {
    let (portal, stub) = signed_in().await;
    let cost = OfferCost {
        daily_rate: 850.0,
        total_man_days: 10.0,
        travel_cost_per_onsite_day: 50.0,
        onsite_days: 3.0,
    };
    let created = portal
        .create_service_offer(&NewServiceOffer {
            service_request_id: 12,
            specialist_id: 4,
            daily_rate: cost.daily_rate,
            travel_cost_per_onsite_day: cost.travel_cost_per_onsite_day,
            total_man_days: cost.total_man_days,
            onsite_days: cost.onsite_days,
            total_cost: cost.total(),
            status: ServiceOfferStatus::Submitted,
        })
        .await
        .expect("service offer");
    assert_eq!(created.total_cost, Some(8650.0));

    let sent = stub.last_offer.lock().unwrap().clone().expect("captured body");
    assert_eq!(sent["total_cost"], json!(8650.0));
    assert_eq!(sent["daily_rate"], json!(850.0));
    assert_eq!(sent["status"], json!("Submitted"));
}
