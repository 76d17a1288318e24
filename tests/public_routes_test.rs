mod common;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};

use common::{TestApp, API};

#[actix_rt::test]
async fn test_root_endpoint() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Welcome to Travel Planner API");
    assert_eq!(body["docs"], "/docs");
    assert!(body["version"].is_string());
}

#[actix_rt::test]
async fn test_health_check() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"status": "healthy", "service": "Travel Planner API", "store": "memory"})
    );
}

#[actix_rt::test]
async fn test_unknown_route_is_not_found() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/travel/nowhere")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_geocode() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri(&format!("{}/geocode?address=%E6%98%A5%E7%86%99%E8%B7%AF&location=%E6%88%90%E9%83%BD", API))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["latitude"], 30.657);
    assert_eq!(body["longitude"], 104.066);
}

#[actix_rt::test]
async fn test_geocode_unresolved_is_not_found() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    // Foreign addresses go to Mapbox and Google, which know nothing here.
    let req = test::TestRequest::get()
        .uri(&format!("{}/geocode?address=Louvre&location=Paris", API))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "无法解析该地址");
}

#[actix_rt::test]
async fn test_geocode_requires_address() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri(&format!("{}/geocode", API))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_rt::test]
async fn test_recommendations_filter_by_interest() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri(&format!(
            "{}/recommendations?destination=%E6%88%90%E9%83%BD&interests=%E4%B8%89%E5%9B%BD",
            API
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let attractions = body["attractions"].as_array().unwrap();
    assert_eq!(attractions.len(), 1);
    assert_eq!(attractions[0]["name"], "武侯祠");
    assert_eq!(body["restaurants"].as_array().unwrap().len(), 2);
}
