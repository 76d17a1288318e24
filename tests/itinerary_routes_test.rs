mod common;

use actix_web::{http::StatusCode, test};
use serde_json::{json, Value};

use travel_planner_api::sse::{SseDecoder, SseFrame};

use common::{plan_payload, ScriptedModel, TestApp, API, MISSING_PLAN_ID, REPLY};

async fn create_plan(test_app: &TestApp) -> String {
    let request = serde_json::from_value(plan_payload()).unwrap();
    let plan = test_app.state.travel.create_plan("1", request).await.unwrap();
    plan.id
}

fn decode(body: &[u8]) -> Vec<SseFrame> {
    let mut decoder = SseDecoder::new();
    let mut frames = decoder.push(body);
    frames.extend(decoder.finish());
    frames
}

fn dates(start: &str, end: &str) -> Value {
    json!({"start_date": start, "end_date": end})
}

#[actix_rt::test]
async fn test_stream_itinerary() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let plan_id = create_plan(&test_app).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/plans/{}/generate-itinerary/stream", API, plan_id))
        .set_json(dates("2025-05-01", "2025-05-02"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers.get("content-type").unwrap(), "text/event-stream");
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    assert_eq!(headers.get("x-accel-buffering").unwrap(), "no");

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b":\n\n"));
    let frames = decode(&body);

    let names: Vec<&str> = frames
        .iter()
        .map(|f| f.event.as_str())
        .filter(|e| *e != "token")
        .collect();
    assert_eq!(
        names,
        vec![
            "started",
            "heartbeat",
            "progress",
            "progress",
            "progress",
            "progress",
            "progress",
            "day",
            "day",
            "result"
        ]
    );

    let stages: Vec<String> = frames
        .iter()
        .filter(|f| f.event == "progress")
        .map(|f| f.json().unwrap()["stage"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        stages,
        vec!["llm_stream_start", "llm_stream_end", "parse_json", "fetch_recommendations", "persist"]
    );

    let streamed: String = frames
        .iter()
        .filter(|f| f.event == "token")
        .map(|f| f.json().unwrap()["delta"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(streamed, REPLY);

    let started = frames[0].json().unwrap();
    assert_eq!(started["travel_plan_id"], plan_id.as_str());
    assert_eq!(started["destination"], "成都");

    let day_one = frames.iter().find(|f| f.event == "day").unwrap().json().unwrap();
    assert_eq!(day_one["day_number"], 1);
    let items = day_one["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["uniqueId"], "spot_1_0");
    assert_eq!(items[0]["duration"], 150);
    assert_eq!(items[0]["lat"], 30.73);
    assert_eq!(items[1]["name"], "宽窄巷子");
    assert_eq!(items[1]["duration"], 90);
    assert_eq!(items[2]["uniqueId"], "rest_1_0");
    assert_eq!(items[2]["category"], "美食");
    assert_eq!(items[2]["cuisine"], "火锅");
    assert_eq!(
        day_one["stats"],
        json!({"spots": 2, "restaurants": 1, "schedule": {"morning": 1, "afternoon": 1, "evening": 1}})
    );

    let result = frames.last().unwrap().json().unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["days"], 2);
    assert_eq!(result["itinerary_details"].as_array().unwrap().len(), 2);
    assert_eq!(result["attractions"].as_array().unwrap().len(), 2);
    assert_eq!(result["attractions"][1]["latitude"], 30.657);
    assert_eq!(result["flights"].as_array().unwrap().len(), 1);
    assert_eq!(result["accommodations"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri(&format!("{}/plans/{}/itinerary", API, plan_id))
        .to_request();
    let details: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["day_number"], 1);
    assert_eq!(details[0]["recommended_spots"].as_array().unwrap().len(), 2);
    assert_eq!(details[0]["recommended_restaurants"].as_array().unwrap().len(), 1);
    assert_eq!(details[1]["itinerary"], json!({}));
}

#[actix_rt::test]
async fn test_stream_reports_model_failure_as_event() {
    let test_app = TestApp::with_model(ScriptedModel::failing("upstream exploded"));
    let app = test::init_service(test_app.create_app()).await;
    let plan_id = create_plan(&test_app).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/plans/{}/generate-itinerary/stream", API, plan_id))
        .set_json(dates("2025-05-01", "2025-05-01"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let frames = decode(&test::read_body(resp).await);
    let last = frames.last().unwrap();
    assert_eq!(last.event, "error");
    assert!(last.json().unwrap()["message"]
        .as_str()
        .unwrap()
        .contains("upstream exploded"));
    assert!(frames.iter().all(|f| f.event != "result"));
}

#[actix_rt::test]
async fn test_stream_rejects_inverted_dates_and_missing_plan() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let plan_id = create_plan(&test_app).await;

    let req = test::TestRequest::post()
        .uri(&format!("{}/plans/{}/generate-itinerary/stream", API, plan_id))
        .set_json(dates("2025-05-03", "2025-05-01"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&format!(
            "{}/plans/{}/generate-itinerary/stream",
            API, MISSING_PLAN_ID
        ))
        .set_json(dates("2025-05-01", "2025-05-02"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_itinerary_details_missing_before_generation() {
    let test_app = TestApp::new();
    let app = test::init_service(test_app.create_app()).await;
    let plan_id = create_plan(&test_app).await;

    let req = test::TestRequest::get()
        .uri(&format!("{}/plans/{}/itinerary", API, plan_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "路线详情不存在");
}
