mod common;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use common::{harness, FakeSource, Harness};
use gameshelf::api::auth::{issue_token, Auth};
use gameshelf::api::middleware::json_config;
use gameshelf::api::routes::configure_routes;
use gameshelf::api::AppState;
use gameshelf::ingest::config::IngestConfig;
use gameshelf::ingest::models::SourceKind;

const SECRET: &str = "test-secret";

async fn setup(source: FakeSource) -> (Harness, web::Data<AppState>) {
    let h = harness(source, IngestConfig::default()).await;
    let state = web::Data::new(AppState::new(h.orchestrator.clone(), None));
    (h, state)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .app_data(json_config())
                .wrap(Auth::new(SECRET.to_string()))
                .configure(configure_routes),
        )
        .await
    };
}

fn bearer() -> (&'static str, String) {
    (
        "Authorization",
        format!("Bearer {}", issue_token(5, SECRET, 3600).unwrap()),
    )
}

fn games(names: &[&str], source: &str) -> Value {
    json!({ "games": names.iter().map(|n| json!({"name": n, "source": source})).collect::<Vec<_>>() })
}

#[actix_web::test]
async fn health_needs_no_token() {
    let (_h, state) = setup(FakeSource::new(SourceKind::Wiki)).await;
    let app = app!(state);
    for uri in ["/health", "/api/health"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

#[actix_web::test]
async fn single_resolvable_name_is_created() {
    let (h, state) = setup(FakeSource::new(SourceKind::Wiki)).await;
    let app = app!(state);
    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(bearer())
        .set_json(games(&["Half-Life 2"], "Wiki"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);
    assert_eq!(body["success"][0]["title"], "Half-Life 2");
    assert_eq!(body["success"][0]["creator"], 5);
    assert!(body["success"][0].get("preambula").is_some());
    assert_eq!(h.catalog.links.lock().unwrap()[0].user_id, 5);
}

#[actix_web::test]
async fn partial_batch_is_multi_status() {
    let (_h, state) =
        setup(FakeSource::new(SourceKind::Wiki).with_unknown(&["UnknownGarbageNameXYZ"])).await;
    let app = app!(state);
    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(bearer())
        .set_json(games(&["Half-Life 2", "UnknownGarbageNameXYZ"], "Wiki"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::MULTI_STATUS);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"][0]["name"], "UnknownGarbageNameXYZ");
    assert!(body["errors"][0]["error"].as_str().unwrap().contains("no Wiki page"));
}

#[actix_web::test]
async fn all_failed_is_internal_error() {
    let (_h, state) = setup(FakeSource::new(SourceKind::Wiki).with_unknown(&["A"])).await;
    let app = app!(state);
    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(bearer())
        .set_json(games(&["A"], "Wiki"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn oversized_and_empty_batches_are_bad_requests() {
    let (h, state) = setup(FakeSource::new(SourceKind::Wiki)).await;
    let app = app!(state);

    let names: Vec<String> = (0..101).map(|i| format!("Game {i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    for payload in [games(&refs, "Wiki"), json!({ "games": [] })] {
        let req = test::TestRequest::post()
            .uri("/api/games/multi")
            .insert_header(bearer())
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(h.catalog.total_calls(), 0);
}

#[actix_web::test]
async fn unknown_source_and_malformed_json_are_bad_requests() {
    let (_h, state) = setup(FakeSource::new(SourceKind::Wiki)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(bearer())
        .set_json(games(&["Portal"], "GOG"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(bearer())
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"games\": [")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn missing_or_invalid_identity_is_unauthorized() {
    let (h, state) = setup(FakeSource::new(SourceKind::Wiki)).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .set_json(games(&["Portal"], "Wiki"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let zero_user = format!("Bearer {}", issue_token(0, SECRET, 3600).unwrap());
    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(("Authorization", zero_user))
        .set_json(games(&["Portal"], "Wiki"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::post()
        .uri("/api/games/multi")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .set_json(games(&["Portal"], "Wiki"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(h.catalog.total_calls(), 0);
}

#[actix_web::test]
async fn catalog_endpoint_ignores_item_source() {
    let (h, state) = setup(FakeSource::new(SourceKind::Catalog)).await;
    let app = app!(state);
    let req = test::TestRequest::post()
        .uri("/api/games/multi/catalog")
        .insert_header(bearer())
        .set_json(games(&["Portal 2"], "whatever"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(h.catalog.games.lock().unwrap().len(), 1);
}
