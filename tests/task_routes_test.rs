mod common;

use std::time::Duration;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};

use common::{plan_payload, TestApp, API, MISSING_PLAN_ID};

/// Waits until the registry reports the task as finished.
async fn wait_for_task(test_app: &TestApp, task_id: &str) {
    for _ in 0..100 {
        let status = test_app.state.tasks.status(task_id);
        if status.status == "success" || status.status == "failure" {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[actix_rt::test]
async fn test_unknown_task_is_pending() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri(&format!("{}/tasks/no-such-task/status", API))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({"task_id": "no-such-task", "status": "pending", "message": "任务等待中"})
    );
}

#[actix_rt::test]
async fn test_background_generation() {
    let test_app = TestApp::new();
    let request = serde_json::from_value(plan_payload()).unwrap();
    let plan = test_app.state.travel.create_plan("1", request).await.unwrap();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/plans/{}/generate-itinerary", API, plan.id))
        .set_json(json!({"start_date": "2025-05-01", "end_date": "2025-05-03"}))
        .to_request();
    let submitted: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(submitted["status"], "pending");
    let task_id = submitted["task_id"].as_str().unwrap().to_string();

    wait_for_task(&test_app, &task_id).await;
    let req = test::TestRequest::get()
        .uri(&format!("{}/tasks/{}/status", API, task_id))
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["status"], "success");
    assert_eq!(status["message"], "任务完成");
    assert_eq!(status["result"]["days"], 3);
    assert_eq!(status["result"]["itinerary_details"].as_array().unwrap().len(), 3);
}

#[actix_rt::test]
async fn test_background_generation_validates_first() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/plans/{}/generate-itinerary", API, MISSING_PLAN_ID))
        .set_json(json!({"start_date": "2025-05-01", "end_date": "2025-05-03"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_fetch_attractions_then_search() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/attractions/fetch", API))
        .set_json(json!({"city": "成都"}))
        .to_request();
    let submitted: Value = test::call_and_read_body_json(&app, req).await;
    let task_id = submitted["task_id"].as_str().unwrap().to_string();

    wait_for_task(&test_app, &task_id).await;
    let req = test::TestRequest::get()
        .uri(&format!("{}/tasks/{}/status", API, task_id))
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["status"], "success");
    assert_eq!(status["result"]["saved_count"], 2);

    let req = test::TestRequest::get()
        .uri(&format!("{}/attractions?city=%E6%88%90%E9%83%BD", API))
        .to_request();
    let attractions: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(attractions.len(), 2);

    let req = test::TestRequest::get()
        .uri(&format!("{}/attractions?keyword=%E4%B8%89%E5%9B%BD", API))
        .to_request();
    let attractions: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(attractions.len(), 1);
    assert_eq!(attractions[0]["name"], "武侯祠");
}

#[actix_rt::test]
async fn test_fetch_restaurants_then_search() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/restaurants/fetch", API))
        .set_json(json!({"city": "成都", "cuisine_type": "川菜"}))
        .to_request();
    let submitted: Value = test::call_and_read_body_json(&app, req).await;
    let task_id = submitted["task_id"].as_str().unwrap();
    wait_for_task(&test_app, task_id).await;
    let status = test_app.state.tasks.status(task_id);
    assert_eq!(status.result.unwrap()["saved_count"], 2);

    let req = test::TestRequest::get()
        .uri(&format!(
            "{}/restaurants?city=%E6%88%90%E9%83%BD&cuisine_type=%E5%B7%9D%E8%8F%9C",
            API
        ))
        .to_request();
    let restaurants: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(restaurants.len(), 2);
}

#[actix_rt::test]
async fn test_tool_routes() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;

    let req = test::TestRequest::get()
        .uri(&format!("{}/tools", API))
        .to_request();
    let schemas: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(schemas.len(), 5);
    assert_eq!(schemas[0]["name"], "geocode");

    let req = test::TestRequest::post()
        .uri(&format!("{}/tools/search_attractions", API))
        .set_json(json!({"city": "成都"}))
        .to_request();
    let output: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(output["success"], true);
    assert_eq!(output["count"], 2);

    let req = test::TestRequest::post()
        .uri(&format!("{}/tools/search_attractions", API))
        .set_json(json!({"keyword": "寺"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&format!("{}/tools/book_hotel", API))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
