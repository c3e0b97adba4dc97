// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::error::Result;
use crate::interceptor::{
  CallDescriptor,
  StreamInterceptor,
  StreamNext,
  UnaryInterceptor,
  UnaryNext,
  outcome_code,
};
use crate::stream::CallStream;
use async_trait::async_trait;
use http::Extensions;
use mw_server_stats::stats::Scope;
use prometheus::{HistogramVec, IntCounterVec};

// Handling time buckets, tuned for RPCs ranging from sub-millisecond to multi-minute streams.
pub const DEFAULT_HANDLING_BUCKETS: [f64; 14] = [
  0.001, 0.01, 0.1, 0.3, 0.6, 1.0, 3.0, 6.0, 9.0, 20.0, 30.0, 60.0, 90.0, 120.0,
];

//
// RpcStats
//

// Per-call request stats. Creation is idempotent for a given scope since the underlying metrics
// are cached by name, so multiple chains can account into the same counters.
#[derive(Clone)]
pub struct RpcStats {
  requests_total: IntCounterVec,
  handling_seconds: HistogramVec,
}

impl RpcStats {
  #[must_use]
  pub fn new(scope: &Scope) -> Self {
    Self {
      requests_total: scope.counter_vec("requests_total", &["method", "code"]),
      handling_seconds: scope.histogram_vec_with_buckets(
        "handling_seconds",
        &["method"],
        &DEFAULT_HANDLING_BUCKETS,
      ),
    }
  }

  fn observe<T>(&self, call: &CallDescriptor, result: &Result<T>) {
    self
      .requests_total
      .with_label_values(&[call.path(), outcome_code(result).as_str()])
      .inc();
    self
      .handling_seconds
      .with_label_values(&[call.path()])
      .observe(call.elapsed().as_secs_f64());
  }
}

//
// MetricsInterceptor
//

// Counts every finished call by method and outcome code and records its handling time. For
// streaming calls the handling time covers the full stream lifetime on the server and stream
// establishment on the client.
pub struct MetricsInterceptor {
  stats: RpcStats,
}

impl MetricsInterceptor {
  #[must_use]
  pub const fn new(stats: RpcStats) -> Self {
    Self { stats }
  }
}

#[async_trait]
impl<ResultType: Send + 'static> UnaryInterceptor<ResultType> for MetricsInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    context: Extensions,
    next: UnaryNext<'_, ResultType>,
  ) -> Result<ResultType> {
    let result = next.run(call, context).await;
    self.stats.observe(call, &result);
    result
  }
}

#[async_trait]
impl StreamInterceptor for MetricsInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    stream: Box<dyn CallStream>,
    next: StreamNext<'_>,
  ) -> Result<()> {
    let result = next.run(call, stream).await;
    self.stats.observe(call, &result);
    result
  }
}
