//! Field generators for the built-in streams.
//!
//! Each generator fills the stream-specific part of an event; the envelope
//! (`event_id`, `user_id`, `device_id`, `timestamp`, `stream`) is added by
//! [`crate::EventFactory`].

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde_json::{json, Map, Value};

/// Length of the `training_data` embedding vector.
pub const EMBEDDING_DIM: usize = 128;

/// Recommendations shown per `recommendation_feedback` event.
pub const ITEMS_SHOWN: usize = 6;

fn pick<R: Rng>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

/// `""` 85% of the time, otherwise one of `errors` uniformly.
fn pick_error<R: Rng>(rng: &mut R, errors: &[&'static str]) -> &'static str {
    if rng.random_bool(0.85) {
        ""
    } else {
        pick(rng, errors)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn semver<R: Rng>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}",
        rng.random_range(1..=5),
        rng.random_range(0..=9),
        rng.random_range(0..=9)
    )
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub fn video_logs(rng: &mut StdRng) -> Map<String, Value> {
    into_map(json!({
        "video_id": format!("vid_{}", rng.random_range(1000..=9999)),
        "action": pick(rng, &["play", "pause", "seek", "buffer"]),
        "position": round_to(rng.random_range(0.0..=3600.0), 2),
        "quality": pick(rng, &["480p", "720p", "1080p"]),
        "bandwidth_mbps": round_to(rng.random_range(0.5..=5.0), 2),
    }))
}

pub fn user_interactions(rng: &mut StdRng) -> Map<String, Value> {
    into_map(json!({
        "event_type": pick(rng, &["click", "hover", "scroll", "like"]),
        "element": pick(rng, &["video_thumbnail", "play_button", "volume_control", "search_bar"]),
        "page": pick(rng, &["/home", "/watch", "/search", "/profile"]),
    }))
}

pub fn device_telemetry(rng: &mut StdRng) -> Map<String, Value> {
    into_map(json!({
        "os": pick(rng, &["Android", "iOS", "Windows", "macOS", "Linux"]),
        "app_version": semver(rng),
        "battery": rng.random_range(10..=100),
        "temperature_c": round_to(rng.random_range(30.0..=45.0), 2),
        "errors": pick_error(rng, &["crash", "timeout", "memory_leak"]),
        "network_type": pick(rng, &["wifi", "4g", "5g", "ethernet"]),
    }))
}

pub fn recommendation_feedback(rng: &mut StdRng) -> Map<String, Value> {
    let items: Vec<String> = (0..ITEMS_SHOWN)
        .map(|_| format!("v{}", rng.random_range(1000..=9999)))
        .collect();
    let clicked = rng.random_range(0..items.len());
    // Ids may repeat; the rank is the first position holding the clicked id.
    let rank = items
        .iter()
        .position(|item| *item == items[clicked])
        .unwrap_or(clicked)
        + 1;

    into_map(json!({
        "recommendation_id": format!("rec_{}", rng.random_range(100..=999)),
        "item_clicked": items[clicked].clone(),
        "click_rank": rank,
        "items_shown": items,
        "engagement_time_sec": rng.random_range(5..=300),
    }))
}

pub fn training_data(rng: &mut StdRng) -> Map<String, Value> {
    let embedding: Vec<f64> = (0..EMBEDDING_DIM)
        .map(|_| round_to(rng.random::<f64>(), 4))
        .collect();

    into_map(json!({
        "doc_id": format!("doc_{}", rng.random_range(100_000..=999_999)),
        "source": pick(rng, &["web", "upload", "s3_dump", "api"]),
        "language": pick(rng, &["en", "es", "fr", "de", "zh"]),
        "length_tokens": rng.random_range(50..=2000),
        "embedding_hash": format!("{:012x}", rng.random::<u64>() & 0xffff_ffff_ffff),
        "embedding": embedding,
        "license": pick(rng, &["open", "restricted", "unknown"]),
    }))
}

pub fn model_telemetry(rng: &mut StdRng) -> Map<String, Value> {
    into_map(json!({
        "model_id": format!("model_{}", rng.random_range(1..=100)),
        "version": semver(rng),
        "accuracy": round_to(rng.random_range(0.85..=0.99), 4),
        "latency_ms": rng.random_range(10..=1000),
        "errors": pick_error(rng, &["timeout", "memory_error", "inference_error"]),
        "batch_size": *[1, 4, 8, 16, 32].choose(rng).unwrap_or(&1),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_video_logs_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let fields = video_logs(&mut rng);
            let video_id = fields["video_id"].as_str().unwrap();
            assert!(video_id.starts_with("vid_"));
            let position = fields["position"].as_f64().unwrap();
            assert!((0.0..=3600.0).contains(&position));
            let bandwidth = fields["bandwidth_mbps"].as_f64().unwrap();
            assert!((0.5..=5.0).contains(&bandwidth));
            assert!(["480p", "720p", "1080p"].contains(&fields["quality"].as_str().unwrap()));
        }
    }

    #[test]
    fn test_device_telemetry_errors_mostly_empty() {
        let mut rng = StdRng::seed_from_u64(42);
        let total = 10_000;
        let empty = (0..total)
            .filter(|_| device_telemetry(&mut rng)["errors"] == "")
            .count();
        let ratio = empty as f64 / total as f64;
        assert!((ratio - 0.85).abs() < 0.02, "ratio was {ratio}");
    }

    #[test]
    fn test_device_telemetry_ranges() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let fields = device_telemetry(&mut rng);
            let battery = fields["battery"].as_i64().unwrap();
            assert!((10..=100).contains(&battery));
            let parts: Vec<&str> = fields["app_version"].as_str().unwrap().split('.').collect();
            assert_eq!(parts.len(), 3);
        }
    }

    #[test]
    fn test_recommendation_click_is_shown() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let fields = recommendation_feedback(&mut rng);
            let items = fields["items_shown"].as_array().unwrap();
            assert_eq!(items.len(), ITEMS_SHOWN);
            let clicked = &fields["item_clicked"];
            let rank = fields["click_rank"].as_u64().unwrap() as usize;
            assert!((1..=ITEMS_SHOWN).contains(&rank));
            assert_eq!(&items[rank - 1], clicked);
        }
    }

    #[test]
    fn test_training_data_embedding() {
        let mut rng = StdRng::seed_from_u64(42);
        let fields = training_data(&mut rng);
        let embedding = fields["embedding"].as_array().unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIM);
        assert!(embedding
            .iter()
            .all(|v| (0.0..=1.0).contains(&v.as_f64().unwrap())));
        assert_eq!(fields["embedding_hash"].as_str().unwrap().len(), 12);
    }

    #[test]
    fn test_model_telemetry_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let fields = model_telemetry(&mut rng);
            let accuracy = fields["accuracy"].as_f64().unwrap();
            assert!((0.85..=0.99).contains(&accuracy));
            let batch = fields["batch_size"].as_i64().unwrap();
            assert!([1, 4, 8, 16, 32].contains(&batch));
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.99996, 4), 1.0);
    }
}
