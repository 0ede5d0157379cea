//! Weighted stream selection.

use flux_core::{ConfigError, StreamConfig};
use rand::Rng;
use std::collections::BTreeMap;

/// Picks a stream name with probability proportional to its weight.
///
/// Weights are turned into prefix sums once; each pick is a single uniform
/// draw in `[0, total)` followed by a binary search.
#[derive(Debug, Clone)]
pub struct StreamSelector {
    names: Vec<String>,
    cumulative: Vec<f64>,
    total: f64,
}

impl StreamSelector {
    /// Build a selector from the configured stream table.
    pub fn new(streams: &BTreeMap<String, StreamConfig>) -> Result<Self, ConfigError> {
        Self::from_weights(streams.iter().map(|(name, s)| (name.as_str(), s.weight)))
    }

    /// Build a selector from `(name, weight)` pairs.
    pub fn from_weights<'a, I>(weights: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut names = Vec::new();
        let mut cumulative = Vec::new();
        let mut total = 0.0;

        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    stream: name.to_string(),
                    weight,
                });
            }
            total += weight;
            names.push(name.to_string());
            cumulative.push(total);
        }

        if names.is_empty() {
            return Err(ConfigError::EmptyStreams);
        }
        if total <= 0.0 {
            return Err(ConfigError::AllWeightsZero);
        }

        Ok(Self {
            names,
            cumulative,
            total,
        })
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
        let draw = rng.random::<f64>() * self.total;
        // First bucket whose upper bound exceeds the draw; zero-weight
        // buckets have an empty range and are never chosen.
        let index = self
            .cumulative
            .partition_point(|bound| *bound <= draw)
            .min(self.names.len() - 1);
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
