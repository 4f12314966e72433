//! Lenient extraction of numbers from API payloads. Anything missing or of
//! the wrong shape comes out as `None`.

use serde_json::{
    Map,
    Value,
};
use unsplash_stats_store::MetricTotals;

pub fn as_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|float| float.is_finite()).map(|float| float.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

pub fn as_text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// `total` and `historical.change` of a single metric object.
fn metric(stats: &Value, name: &str) -> (Option<i64>, Option<i64>) {
    let Some(metric) = as_object(stats.get(name)) else {
        return (None, None);
    };
    let change = as_object(metric.get("historical")).and_then(|historical| as_int(historical.get("change")));
    (as_int(metric.get("total")), change)
}

/// Reads the `downloads`, `views` and `likes` figures of a statistics response.
pub fn metric_totals(stats: &Value) -> MetricTotals {
    let (downloads_total, downloads_change_30d) = metric(stats, "downloads");
    let (views_total, views_change_30d) = metric(stats, "views");
    let (likes_total, likes_change_30d) = metric(stats, "likes");
    MetricTotals {
        downloads_total,
        views_total,
        likes_total,
        downloads_change_30d,
        views_change_30d,
        likes_change_30d,
    }
}
