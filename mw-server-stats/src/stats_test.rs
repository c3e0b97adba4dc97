// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::stats::Collector;
use crate::test::util::stats::Helper;
use prometheus::labels;

#[ctor::ctor]
fn test_global_init() {
  mw_test_helpers::test_global_init();
}

#[test]
fn scoped_metric_names() {
  let collector = Collector::default();
  let scope = collector.scope("grpc").scope("server");
  let counter = scope.counter("requests");
  counter.inc();

  let helper = Helper::new_with_collector(collector);
  helper.assert_counter_eq(1, "grpc_server_requests", &labels! {});
}

#[test]
fn counter_registration_is_idempotent() {
  let collector = Collector::default();
  let scope = collector.scope("test");

  // Both handles must be backed by the same underlying counter.
  scope.counter("hello").inc();
  scope.counter("hello").inc();

  let helper = Helper::new_with_collector(collector);
  helper.assert_counter_eq(2, "test_hello", &labels! {});
}

#[test]
fn vec_registration_is_idempotent() {
  let collector = Collector::default();
  let scope = collector.scope("test");

  let first = scope.counter_vec("requests", &["code"]);
  let second = scope.counter_vec("requests", &["code"]);
  first.with_label_values(&["ok"]).inc();
  second.with_label_values(&["ok"]).inc();
  second.with_label_values(&["internal"]).inc();

  let first = scope.histogram_vec_with_buckets("handling", &["method"], &[0.1, 1.0, 10.0]);
  let second = scope.histogram_vec_with_buckets("handling", &["method"], &[0.1, 1.0, 10.0]);
  first.with_label_values(&["/a/B"]).observe(0.5);
  second.with_label_values(&["/a/B"]).observe(2.0);

  let helper = Helper::new_with_collector(collector);
  helper.assert_counter_eq(2, "test_requests", &labels! {"code" => "ok"});
  helper.assert_counter_eq(1, "test_requests", &labels! {"code" => "internal"});
  helper.assert_histogram_count(2, "test_handling", &labels! {"method" => "/a/B"});
}

#[test]
fn prometheus_output_contains_registered_metrics() {
  let collector = Collector::default();
  collector.scope("demo").counter("events").inc();

  let output = String::from_utf8(collector.prometheus_output()).unwrap();
  assert!(output.contains("demo_events 1"), "{output}");
}
