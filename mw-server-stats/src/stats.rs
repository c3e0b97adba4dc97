// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./stats_test.rs"]
mod stats_test;

use dashmap::DashMap;
use prometheus::proto::MetricFamily;
use prometheus::{
  Encoder,
  HistogramOpts,
  HistogramVec,
  IntCounter,
  IntCounterVec,
  Opts,
  Registry,
  TextEncoder,
};
use std::sync::Arc;

const SEP: &str = "_";

//
// Scope
//

// Named metrics scope used to create metrics. Creation is idempotent per final metric name: asking
// for the same metric twice hands back the already registered instance, so independently
// constructed components can share a scope without registration conflicts. A metric name owns its
// label set; requesting an existing name with different labels returns the original metric.
#[derive(Clone)]
pub struct Scope {
  name: String,
  collector: Collector,
}

impl Scope {
  // Create a sub-scope.
  #[must_use]
  pub fn scope(&self, extend: &str) -> Self {
    let name = if extend.is_empty() {
      self.name.clone()
    } else {
      self.metric_name(extend)
    };

    Self {
      name,
      collector: self.collector.clone(),
    }
  }

  // Create a new counter, or fetch the existing one registered under the same name.
  #[must_use]
  pub fn counter(&self, name: &str) -> IntCounter {
    let name = self.metric_name(name);
    self
      .collector
      .inner
      .counters
      .entry(name.clone())
      .or_insert_with(|| {
        let counter = IntCounter::with_opts(Opts::new(name, "-")).unwrap();
        self.collector.register(counter.clone());
        counter
      })
      .clone()
  }

  // Create a new counter vec that can be used to produce labeled counters.
  #[must_use]
  pub fn counter_vec(&self, name: &str, labels: &[&str]) -> IntCounterVec {
    let name = self.metric_name(name);
    self
      .collector
      .inner
      .counter_vecs
      .entry(name.clone())
      .or_insert_with(|| {
        let vec = IntCounterVec::new(Opts::new(name, "-"), labels).unwrap();
        self.collector.register(vec.clone());
        vec
      })
      .clone()
  }

  // Create a new histogram vec with custom buckets.
  #[must_use]
  pub fn histogram_vec_with_buckets(
    &self,
    name: &str,
    labels: &[&str],
    buckets: &[f64],
  ) -> HistogramVec {
    let name = self.metric_name(name);
    self
      .collector
      .inner
      .histogram_vecs
      .entry(name.clone())
      .or_insert_with(|| {
        let vec = HistogramVec::new(
          HistogramOpts::new(name, "-").buckets(buckets.to_vec()),
          labels,
        )
        .unwrap();
        self.collector.register(vec.clone());
        vec
      })
      .clone()
  }

  // Build the final metric name from the current scope.
  fn metric_name(&self, name: &str) -> String {
    if self.name.is_empty() {
      name.to_string()
    } else {
      format!("{}{SEP}{name}", self.name)
    }
  }
}

//
// Collector
//

// Wrapper around a prometheus registry that deduplicates metric construction.
struct CollectorInner {
  registry: Registry,
  counters: DashMap<String, IntCounter>,
  counter_vecs: DashMap<String, IntCounterVec>,
  histogram_vecs: DashMap<String, HistogramVec>,
}

#[derive(Clone)]
pub struct Collector {
  inner: Arc<CollectorInner>,
}

impl Default for Collector {
  fn default() -> Self {
    Self {
      inner: Arc::new(CollectorInner {
        registry: Registry::default(),
        counters: DashMap::new(),
        counter_vecs: DashMap::new(),
        histogram_vecs: DashMap::new(),
      }),
    }
  }
}

impl Collector {
  // Create a named scope.
  #[must_use]
  pub fn scope(&self, name: &str) -> Scope {
    Scope {
      name: name.to_string(),
      collector: self.clone(),
    }
  }

  // Registration failures are programming errors (a name collision between different metric
  // types) so they abort at startup rather than being propagated.
  fn register(&self, metric: impl prometheus::core::Collector + 'static) {
    self.inner.registry.register(Box::new(metric)).unwrap();
  }

  // Gather all metrics in proto form.
  #[must_use]
  pub fn gather(&self) -> Vec<MetricFamily> {
    self.inner.registry.gather()
  }

  // Dump prometheus text output.
  #[must_use]
  pub fn prometheus_output(&self) -> Vec<u8> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];

    encoder.encode(&self.gather(), &mut buffer).unwrap();
    buffer
  }
}
