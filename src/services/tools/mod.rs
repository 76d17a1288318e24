//! Function-calling tools exposed to the LLM and to `POST /tools/{name}`.
//!
//! Schemas follow the OpenAI function format so they can be passed to the
//! model unchanged.

use serde_json::{json, Map, Value};
use thiserror::Error;

mod executor;

pub use executor::ToolExecutor;

pub const GEOCODE: &str = "geocode";
pub const SEARCH_ATTRACTIONS: &str = "search_attractions";
pub const SEARCH_RESTAURANTS: &str = "search_restaurants";
pub const SEARCH_PLACES: &str = "search_places";
pub const GET_XIAOHONGSHU_CDATA: &str = "get_xiaohongshu_cdata";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("argument {name} must be of type {expected}")]
    InvalidArgument { name: String, expected: String },

    #[error("argument {name} must be one of {allowed}")]
    NotInEnum { name: String, allowed: String },

    #[error("function {name} failed: {message}")]
    Execution { name: String, message: String },
}

fn string_param(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn function(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
    json!({
        "name": name,
        "description": description,
        "parameters": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Every tool schema, in a stable order.
pub fn all_schemas() -> Vec<Value> {
    vec![
        function(
            GEOCODE,
            "根据地址或地点名称查询经纬度坐标。国内使用高德地图，国外使用Mapbox。",
            json!({
                "address": string_param("需要解析的地址或地点名称，例如：'北京天安门'、'Tokyo Tower'"),
                "location": string_param("可选，目的地城市名称，用于更准确的地理编码"),
            }),
            &["address"],
        ),
        function(
            SEARCH_ATTRACTIONS,
            "搜索指定城市的景点信息。返回景点名称、地址、经纬度、类型等信息。",
            json!({
                "city": string_param("城市名称，例如：'北京'、'Tokyo'"),
                "keyword": string_param("可选，搜索关键词，例如：'博物馆'、'temple'"),
            }),
            &["city"],
        ),
        function(
            SEARCH_RESTAURANTS,
            "搜索指定城市的餐厅信息。返回餐厅名称、地址、经纬度、类型等信息。",
            json!({
                "city": string_param("城市名称，例如：'上海'、'Paris'"),
                "cuisine_type": string_param("可选，菜系类型，例如：'川菜'、'Italian'"),
            }),
            &["city"],
        ),
        function(
            SEARCH_PLACES,
            "通用地点搜索，可以搜索景点、餐厅、酒店等各种类型的地点。",
            json!({
                "keywords": string_param("搜索关键词，例如：'咖啡厅'、'hotel'"),
                "city": string_param("可选，城市名称，用于限定搜索范围"),
                "types": string_param("可选，高德地图类型代码，例如：'110000'（风景名胜）、'050000'（餐饮服务）"),
            }),
            &["keywords"],
        ),
        function(
            GET_XIAOHONGSHU_CDATA,
            "获取小红书笔记的详细内容，用于提取旅行攻略。支持短链接和完整链接。",
            json!({
                "note_url": string_param("小红书笔记的URL，例如：http://xhslink.com/o/xxx 或 https://www.xiaohongshu.com/explore/xxx"),
            }),
            &["note_url"],
        ),
    ]
}

pub fn schema(name: &str) -> Option<Value> {
    all_schemas().into_iter().find(|s| s["name"] == name)
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Checks `args` against the named schema. Extra arguments are allowed.
pub fn validate_args(name: &str, args: &Map<String, Value>) -> Result<(), ToolError> {
    let schema = schema(name).ok_or_else(|| ToolError::UnknownFunction(name.to_string()))?;
    let parameters = &schema["parameters"];

    if let Some(required) = parameters["required"].as_array() {
        for param in required.iter().filter_map(Value::as_str) {
            match args.get(param) {
                None | Some(Value::Null) => {
                    return Err(ToolError::MissingArgument(param.to_string()))
                }
                Some(_) => {}
            }
        }
    }

    let Some(properties) = parameters["properties"].as_object() else {
        return Ok(());
    };
    for (param, value) in args {
        let Some(property) = properties.get(param) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(expected) = property["type"].as_str() {
            if !type_matches(expected, value) {
                return Err(ToolError::InvalidArgument {
                    name: param.clone(),
                    expected: expected.to_string(),
                });
            }
        }
        if let Some(allowed) = property["enum"].as_array() {
            if !allowed.contains(value) {
                return Err(ToolError::NotInEnum {
                    name: param.clone(),
                    allowed: Value::Array(allowed.clone()).to_string(),
                });
            }
        }
    }
    Ok(())
}
