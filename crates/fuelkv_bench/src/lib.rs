//! Benchmark utilities.

#![warn(missing_docs)]

use fuelkv_codec::Value;
use rand::Rng;

/// A random feature vector of `dim` floats in `[-1, 1)`.
pub fn random_features(dim: usize) -> Value {
    let mut rng = rand::thread_rng();
    Value::from((0..dim).map(|_| rng.gen_range(-1.0f64..1.0)).collect::<Vec<f64>>())
}

/// `count` keys of the form `utt-000042`.
pub fn utterance_keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("utt-{i:06}")).collect()
}

/// Keys paired with random feature vectors.
pub fn generate_entries(count: usize, dim: usize) -> Vec<(String, Value)> {
    utterance_keys(count)
        .into_iter()
        .map(|key| (key, random_features(dim)))
        .collect()
}
