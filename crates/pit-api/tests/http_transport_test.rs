//! HttpTransport against the fake backend served over loopback HTTP.

use std::sync::Arc;

use pit_api::config::ApiConfig;
use pit_api::error::ApiError;
use pit_api::http::HttpTransport;
use pit_api::models::{PlanStatus, Role};
use pit_api::queries::{plans, users};
use pit_api::session::{RefreshEndpoint, Session, TokenRefresher};
use pit_api::transport::Method;
use pit_test_utils::{FakeBackend, REFRESH_TOKEN, fixtures, serve};

async fn client_for(base_url: &str, token: &str, with_refresh: bool) -> HttpTransport {
    let config = ApiConfig::new(base_url);
    let refresher: Option<Arc<dyn TokenRefresher>> = if with_refresh {
        Some(Arc::new(RefreshEndpoint::new(
            reqwest::Client::new(),
            base_url,
            REFRESH_TOKEN,
        )))
    } else {
        None
    };
    let session = Arc::new(Session::new(Some(token.to_owned()), refresher));
    HttpTransport::new(config, session).expect("client builds")
}

#[tokio::test]
async fn authenticated_request_reaches_backend() {
    let backend = FakeBackend::new();
    backend.set_me(fixtures::user(7, Role::Teacher));
    let server = serve(backend.clone(), "t1").await;
    let transport = client_for(&server.base_url(), "t1", false).await;

    let me = users::current_user(&transport).await.unwrap();
    assert_eq!(me.id, 7);
    assert_eq!(me.role, Some(Role::Teacher));
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_request_retried() {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::plan(5, 3, PlanStatus::Draft));
    let server = serve(backend.clone(), "t1").await;
    let transport = client_for(&server.base_url(), "t1", true).await;

    server.rotate_token("t2");
    let plan = plans::get_plan(&transport, 5).await.unwrap();

    assert_eq!(plan.id, 5);
    assert_eq!(server.refresh_count(), 1);
    // The first attempt was rejected before reaching the backend.
    assert_eq!(backend.request_count(), 1);
    assert_eq!(
        transport.session().access_token().await.as_deref(),
        Some("t2")
    );
}

#[tokio::test]
async fn missing_refresher_surfaces_unauthorized() {
    let backend = FakeBackend::new();
    let server = serve(backend.clone(), "t1").await;
    let transport = client_for(&server.base_url(), "stale", false).await;

    let err = users::current_user(&transport).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!transport.session().is_authenticated().await);
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn structured_error_body_is_decoded() {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::plan(5, 3, PlanStatus::Approved));
    let server = serve(backend.clone(), "t1").await;
    let transport = client_for(&server.base_url(), "t1", false).await;

    let err = plans::submit_plan(&transport, 5).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.user_message(), "Only draft plans can be submitted.");
}

#[tokio::test]
async fn empty_delete_response_is_accepted() {
    let backend = FakeBackend::new();
    backend.seed_plan(fixtures::board_plan(5, 3));
    let server = serve(backend.clone(), "t1").await;
    let transport = client_for(&server.base_url(), "t1", false).await;

    pit_api::queries::tasks::delete_task(&transport, 14).await.unwrap();
    assert_eq!(backend.plan(5).unwrap().tasks.len(), 5);
    assert_eq!(backend.requests_with(Method::Delete).len(), 1);
}
