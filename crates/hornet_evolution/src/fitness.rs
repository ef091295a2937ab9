//! The fitness function.
//!
//! Pure and deterministic: equal status, elapsed bucket and string length
//! always yield the same score. Higher is better; HTTP 500 dominates.

use hornet_corpus::Query;

/// Scores one dispatched query.
///
/// `status_score + elapsed_score + length_score`, where the length is the
/// query string minus the entity name and the option keys. Shorter strings
/// that still break the server score higher.
#[must_use]
pub fn evaluate(query: &Query, string_threshold: usize) -> i64 {
    let keys_len = query.options.keys_len();
    let length = query
        .query_string
        .len()
        .saturating_sub(query.entity_name.len() + keys_len);

    let mut score = eval_string_length(length, string_threshold);
    if let Some(response) = query.response.as_ref() {
        score += eval_http_status_code(response.status_code);
        score += eval_http_response_time(response.elapsed.as_secs_f64());
    }
    score
}

/// 100 points for an internal server error, nothing otherwise.
#[must_use]
pub const fn eval_http_status_code(status_code: u16) -> i64 {
    if status_code == 500 {
        100
    } else {
        0
    }
}

/// Bucketed response-time score: 0 below 2s, 1 below 10s, 2 below 20s,
/// 5 from 20s up.
#[must_use]
pub fn eval_http_response_time(total_seconds: f64) -> i64 {
    if total_seconds < 2.0 {
        0
    } else if total_seconds < 10.0 {
        1
    } else if total_seconds < 20.0 {
        2
    } else {
        5
    }
}

/// `round(string_threshold / length)`, rounding half away from zero.
#[must_use]
pub fn eval_string_length(length: usize, string_threshold: usize) -> i64 {
    let length = length.max(1);
    (string_threshold as f64 / length as f64).round() as i64
}
