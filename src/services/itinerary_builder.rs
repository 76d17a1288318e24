//! Prompt construction and parsing of the model's itinerary JSON.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::models::itinerary::{DayItem, DayStats, ScheduleStats};

const SEGMENTS: [&str; 3] = ["morning", "afternoon", "evening"];
const DEFAULT_DURATION: u32 = 60;

pub struct PromptInput<'a> {
    pub destination: &'a str,
    pub days: u32,
    pub start_date: &'a str,
    pub travelers: &'a str,
    pub interests: &'a [String],
    pub food_preferences: &'a [String],
    pub budget_min: f64,
    pub budget_max: f64,
    pub note_text: &'a str,
}

fn join_or_default(values: &[String]) -> String {
    if values.is_empty() {
        "无特殊偏好".to_string()
    } else {
        values.join("、")
    }
}

pub fn build_itinerary_prompt(input: &PromptInput<'_>) -> String {
    let notes = if input.note_text.is_empty() {
        String::new()
    } else {
        format!("参考的小红书笔记内容：{}", input.note_text)
    };

    format!(
        r#"你是一位专业的旅行规划师。请为以下旅行需求生成详细的{days}天旅行路线规划。

目的地：{destination}
出发日期：{start_date}
旅行天数：{days}天
出行人员：{travelers}
旅行偏好：{interests}
饮食偏好：{food}
预算范围：{budget_min} - {budget_max} 元

{notes}

请按照以下JSON格式返回路线规划（重点：按早/中/晚分段，并给出“点到点通勤”细节、游玩时长、注意事项）：
{{
    "day_1": {{
        "date": "{start_date}",
        "theme": "主题描述",
        "schedule": {{
            "morning": [
                {{
                    "type": "spot",
                    "name": "景点名称",
                    "description": "景点简介/看点",
                    "play_time_minutes": 90,
                    "recommended_time": "建议游览时间（例如 1-2小时）",
                    "notes": ["注意事项1", "注意事项2"],
                    "commute_from_prev": {{
                        "mode": "步行/地铁/公交/打车",
                        "duration_minutes": 15,
                        "transfers": 1,
                        "details": "是否换乘、建议线路/站点等提示"
                    }}
                }}
            ],
            "afternoon": [
                {{
                    "type": "restaurant",
                    "name": "餐厅名称",
                    "cuisine": "菜系",
                    "description": "餐厅特色与推荐菜",
                    "price_range": "人均/价格范围",
                    "play_time_minutes": 60,
                    "notes": ["注意事项（例如需排队/预约）"],
                    "commute_from_prev": {{
                        "mode": "地铁",
                        "duration_minutes": 25,
                        "transfers": 1,
                        "details": "换乘站点、出站口建议等"
                    }}
                }}
            ],
            "evening": []
        }},
        "tips": "当日旅行小贴士"
    }},
    "day_2": {{...}},
    ...
}}

要求：
1. 每天安排3-5个主要活动
2. 考虑交通便利性和时间合理性
3. 结合用户的旅行偏好和饮食偏好
4. 控制预算在指定范围内
5. 对每个活动给出合理的 play_time_minutes（分钟）
6. 对每个活动尽量给出 notes（注意事项），没有则给空数组 []
7. 对 morning/afternoon/evening 每个列表中，从第二个点开始给出 commute_from_prev（通勤方式/耗时/换乘次数/提示）
8. 确保路线连贯，避免重复路线
9. 不要输出除 JSON 外的任何文字

请直接返回JSON格式，不要包含其他文字说明。"#,
        days = input.days,
        destination = input.destination,
        start_date = input.start_date,
        travelers = input.travelers,
        interests = join_or_default(input.interests),
        food = join_or_default(input.food_preferences),
        budget_min = input.budget_min,
        budget_max = input.budget_max,
        notes = notes,
    )
}

fn fence_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(?i)^\s*```(?:json)?\s*").expect("valid fence regex"),
            Regex::new(r"\s*```\s*$").expect("valid fence regex"),
        )
    })
}

fn strip_code_fences(text: &str) -> String {
    let (open, close) = fence_patterns();
    let text = open.replace(text, "");
    close.replace(&text, "").trim().to_string()
}

/// The fallback used when nothing parseable comes back: empty days with a generic theme.
pub fn default_itinerary(days: u32) -> Map<String, Value> {
    (1..=days)
        .map(|day| {
            (
                format!("day_{}", day),
                json!({
                    "theme": format!("第{}天行程", day),
                    "schedule": {"morning": [], "afternoon": [], "evening": []},
                    "tips": "",
                }),
            )
        })
        .collect()
}

/// Extracts the itinerary object from model output that may carry code
/// fences or stray text around the JSON.
pub fn parse_itinerary_response(text: &str, days: u32) -> Map<String, Value> {
    let raw = strip_code_fences(text.trim());

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&raw) {
        return map;
    }

    for (start, _) in raw.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = values.next() {
            return map;
        }
    }

    if let (Some(first), Some(last)) = (raw.find('{'), raw.rfind('}')) {
        if last > first {
            match serde_json::from_str::<Value>(&raw[first..=last]) {
                Ok(Value::Object(map)) => return map,
                Ok(_) => {}
                Err(e) => log::warn!("Failed to parse itinerary JSON: {}", e),
            }
        }
    }

    log::warn!("Itinerary response was not JSON, using an empty {}-day plan", days);
    default_itinerary(days)
}

fn segment_entries(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Object(obj)) => match obj.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![Value::Object(obj.clone())],
        },
        _ => Vec::new(),
    }
}

fn is_restaurant(entry: &Value) -> bool {
    match entry.get("type").and_then(Value::as_str).filter(|t| !t.is_empty()) {
        Some(kind) => kind == "restaurant",
        None => ["cuisine", "cuisine_type", "price_range"]
            .iter()
            .any(|key| entry.get(*key).map(is_truthy).unwrap_or(false)),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    }
}

fn list_field(day: &Value, key: &str) -> Vec<Value> {
    day.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Returns the day's spots and restaurants. When the model only wrote a
/// `schedule`, the entries are derived from it and written back into `day`.
pub fn normalize_day(day: &mut Value) -> (Vec<Value>, Vec<Value>) {
    if !day.is_object() {
        *day = Value::Object(Map::new());
    }

    let mut spots = list_field(day, "spots");
    let mut restaurants = list_field(day, "restaurants");

    let schedule = day.get("schedule").filter(|s| is_truthy(s)).cloned();
    if spots.is_empty() && restaurants.is_empty() {
        if let Some(schedule) = schedule {
            for segment in SEGMENTS {
                for entry in segment_entries(schedule.get(segment)) {
                    if is_restaurant(&entry) {
                        restaurants.push(entry);
                    } else {
                        spots.push(entry);
                    }
                }
            }
            if let Some(obj) = day.as_object_mut() {
                obj.insert("spots".to_string(), Value::Array(spots.clone()));
                obj.insert("restaurants".to_string(), Value::Array(restaurants.clone()));
            }
        }
    }

    (spots, restaurants)
}

fn lenient_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_minutes(value: Option<&Value>) -> Option<u32> {
    lenient_f64(value)
        .filter(|m| m.is_finite() && *m >= 0.0)
        .map(|m| m as u32)
}

fn non_empty_str(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn field(entry: &Value, key: &str) -> Value {
    entry.get(key).cloned().unwrap_or(Value::Null)
}

/// Turns the day's spots and restaurants into board items, spots first.
pub fn build_day_items(day_number: u32, spots: &[Value], restaurants: &[Value]) -> Vec<DayItem> {
    let spot_items = spots.iter().enumerate().map(|(idx, spot)| DayItem {
        unique_id: format!("spot_{}_{}", day_number, idx),
        name: non_empty_str(spot, "name")
            .or_else(|| non_empty_str(spot, "location"))
            .unwrap_or_else(|| format!("景点{}", idx + 1)),
        category: "景点".to_string(),
        duration: lenient_minutes(spot.get("play_time_minutes"))
            .or_else(|| lenient_minutes(spot.get("recommended_time")))
            .unwrap_or(DEFAULT_DURATION),
        lat: lenient_f64(spot.get("latitude")),
        lng: lenient_f64(spot.get("longitude")),
        description: non_empty_str(spot, "description"),
        notes: field(spot, "notes"),
        commute_from_prev: field(spot, "commute_from_prev"),
        cuisine: None,
        price_range: None,
    });

    let restaurant_items = restaurants.iter().enumerate().map(|(idx, rest)| DayItem {
        unique_id: format!("rest_{}_{}", day_number, idx),
        name: non_empty_str(rest, "name").unwrap_or_else(|| format!("餐厅{}", idx + 1)),
        category: "美食".to_string(),
        duration: lenient_minutes(rest.get("play_time_minutes")).unwrap_or(DEFAULT_DURATION),
        lat: lenient_f64(rest.get("latitude")),
        lng: lenient_f64(rest.get("longitude")),
        description: non_empty_str(rest, "description"),
        notes: field(rest, "notes"),
        commute_from_prev: field(rest, "commute_from_prev"),
        cuisine: non_empty_str(rest, "cuisine"),
        price_range: non_empty_str(rest, "price_range"),
    });

    spot_items.chain(restaurant_items).collect()
}

fn segment_len(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(obj)) => obj
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0),
        _ => 0,
    }
}

pub fn day_stats(day: &Value, spots: &[Value], restaurants: &[Value]) -> DayStats {
    let schedule = day.get("schedule");
    let segment = |name: &str| segment_len(schedule.and_then(|s| s.get(name)));
    DayStats {
        spots: spots.len(),
        restaurants: restaurants.len(),
        schedule: ScheduleStats {
            morning: segment("morning"),
            afternoon: segment("afternoon"),
            evening: segment("evening"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_inputs() {
        let interests = vec!["美食".to_string(), "历史".to_string()];
        let prompt = build_itinerary_prompt(&PromptInput {
            destination: "西安",
            days: 3,
            start_date: "2025-10-01",
            travelers: "family",
            interests: &interests,
            food_preferences: &[],
            budget_min: 1000.0,
            budget_max: 8000.0,
            note_text: "",
        });
        assert!(prompt.contains("详细的3天旅行路线规划"));
        assert!(prompt.contains("目的地：西安"));
        assert!(prompt.contains("旅行偏好：美食、历史"));
        assert!(prompt.contains("饮食偏好：无特殊偏好"));
        assert!(prompt.contains("预算范围：1000 - 8000 元"));
        assert!(prompt.contains("\"date\": \"2025-10-01\""));
        assert!(!prompt.contains("小红书笔记内容"));
    }

    #[test]
    fn test_parse_plain_and_fenced_json() {
        let plain = parse_itinerary_response(r#"{"day_1": {"theme": "a"}}"#, 1);
        assert_eq!(plain["day_1"]["theme"], "a");

        let fenced = parse_itinerary_response("```json\n{\"day_1\": {\"theme\": \"b\"}}\n```", 1);
        assert_eq!(fenced["day_1"]["theme"], "b");
    }

    #[test]
    fn test_parse_object_inside_prose() {
        let text = "Here is the plan: {\"day_1\": {\"theme\": \"c\"}} Enjoy {the trip}";
        let parsed = parse_itinerary_response(text, 2);
        assert_eq!(parsed["day_1"]["theme"], "c");
        assert!(parsed.get("day_2").is_none());
    }

    #[test]
    fn test_parse_falls_back_to_default() {
        let parsed = parse_itinerary_response("sorry, I cannot help", 2);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["day_2"]["theme"], "第2天行程");
        assert_eq!(parsed["day_1"]["schedule"]["evening"], json!([]));
        assert_eq!(parsed["day_1"]["tips"], "");
    }

    #[test]
    fn test_normalize_day_flattens_schedule() {
        let mut day = json!({
            "theme": "老城",
            "schedule": {
                "morning": [{"type": "spot", "name": "钟楼"}],
                "afternoon": {"items": [{"name": "回民街小吃", "cuisine": "清真"}]},
                "evening": {"name": "大唐不夜城"}
            }
        });
        let (spots, restaurants) = normalize_day(&mut day);
        assert_eq!(spots.len(), 2);
        assert_eq!(restaurants.len(), 1);
        assert_eq!(day["spots"][1]["name"], "大唐不夜城");
        assert_eq!(day["restaurants"][0]["cuisine"], "清真");

        let stats = day_stats(&day, &spots, &restaurants);
        assert_eq!(stats.spots, 2);
        assert_eq!(stats.schedule.morning, 1);
        assert_eq!(stats.schedule.afternoon, 1);
        assert_eq!(stats.schedule.evening, 0);
    }

    #[test]
    fn test_normalize_day_keeps_explicit_lists() {
        let mut day = json!({
            "spots": [{"name": "兵马俑"}],
            "schedule": {"morning": [{"name": "ignored"}]}
        });
        let (spots, restaurants) = normalize_day(&mut day);
        assert_eq!(spots.len(), 1);
        assert!(restaurants.is_empty());
        assert!(day.get("restaurants").is_none());

        let mut missing = Value::Null;
        let (spots, restaurants) = normalize_day(&mut missing);
        assert!(spots.is_empty() && restaurants.is_empty());
    }

    #[test]
    fn test_build_day_items() {
        let spots = vec![
            json!({"name": "大雁塔", "play_time_minutes": "90", "latitude": "34.22", "longitude": 108.96}),
            json!({"location": "城墙", "recommended_time": "1-2小时"}),
            json!({}),
        ];
        let restaurants = vec![json!({"cuisine": "陕菜", "price_range": "80", "notes": ["排队"]})];

        let items = build_day_items(2, &spots, &restaurants);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].unique_id, "spot_2_0");
        assert_eq!(items[0].duration, 90);
        assert_eq!(items[0].lat, Some(34.22));
        assert_eq!(items[0].lng, Some(108.96));
        assert_eq!(items[1].name, "城墙");
        assert_eq!(items[1].duration, 60);
        assert_eq!(items[2].name, "景点3");
        assert_eq!(items[3].unique_id, "rest_2_0");
        assert_eq!(items[3].name, "餐厅1");
        assert_eq!(items[3].category, "美食");
        assert_eq!(items[3].cuisine.as_deref(), Some("陕菜"));
        assert_eq!(items[3].notes, json!(["排队"]));
    }
}
