use std::collections::BTreeMap;

use crate::metrics::{Bucket, Metric};

const ISO_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Series keyed by bucket start, each holding every metric by name.
pub fn stats_json(buckets: &[Bucket]) -> BTreeMap<String, BTreeMap<&'static str, f64>> {
    buckets
        .iter()
        .map(|bucket| {
            let values = Metric::ALL
                .iter()
                .map(|metric| (metric.name(), bucket.get(*metric)))
                .collect();
            (bucket.start.format(ISO_TIMESTAMP).to_string(), values)
        })
        .collect()
}
