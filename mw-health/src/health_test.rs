// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::ready::{ReadyError, ReadyOptions, is_ready, wait_until_ready};
use crate::{CheckRequest, ServingStatus, check_method, watch_method};
use assert_matches::assert_matches;
use mw_grpc::client::Client;
use mw_grpc::interceptor::{ClientInterceptors, ServerInterceptors};
use mw_shutdown::ShutdownTrigger;
use mw_time::TimeDurationExt;
use std::net::SocketAddr;
use time::ext::NumericalDuration;
use tokio::net::TcpListener;

#[ctor::ctor]
fn test_global_init() {
  mw_test_helpers::test_global_init();
}

async fn start_health_server() -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let local_address = listener.local_addr().unwrap();
  let router = crate::router(&ServerInterceptors::none());
  tokio::spawn(async move {
    axum::serve(listener, router.into_make_service())
      .await
      .unwrap();
  });
  local_address
}

// An address that refuses connections: bind an ephemeral port and immediately release it.
async fn dead_address() -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  listener.local_addr().unwrap()
}

fn make_client(address: SocketAddr) -> Client<hyper_util::client::legacy::connect::HttpConnector> {
  Client::new_http(
    &address.to_string(),
    500.milliseconds(),
    2,
    ClientInterceptors::none(),
  )
  .unwrap()
}

#[tokio::test]
async fn check_reports_serving() {
  let address = start_health_server().await;
  let client = make_client(address);

  let response = client
    .unary(&check_method(), None, CheckRequest::default(), 5.seconds())
    .await
    .unwrap();
  assert_eq!(ServingStatus::Serving, response.status);
  assert!(is_ready(&client, 5.seconds()).await);
}

#[tokio::test]
async fn watch_streams_single_update() {
  let address = start_health_server().await;
  let client = make_client(address);

  let mut stream = client
    .server_streaming(&watch_method(), None, CheckRequest::default())
    .await
    .unwrap();

  let messages = stream.next().await.unwrap().unwrap();
  assert_eq!(1, messages.len());
  assert_eq!(ServingStatus::Serving, messages[0].status);
  assert!(stream.next().await.unwrap().is_none());
}

#[tokio::test]
async fn is_ready_is_false_when_nothing_listens() {
  let client = make_client(dead_address().await);
  assert!(!is_ready(&client, 500.milliseconds()).await);
}

#[tokio::test]
async fn wait_until_ready_succeeds_within_first_probe() {
  let address = start_health_server().await;
  let client = make_client(address);
  let shutdown_trigger = ShutdownTrigger::default();

  let start = std::time::Instant::now();
  wait_until_ready(
    &client,
    5.seconds(),
    &ReadyOptions::default(),
    shutdown_trigger.make_shutdown(),
  )
  .await
  .unwrap();
  // The first probe fires immediately, well before the first tick interval elapses.
  assert!(start.elapsed() < std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn wait_until_ready_gives_up_at_deadline() {
  let client = make_client(dead_address().await);
  let shutdown_trigger = ShutdownTrigger::default();

  let start = std::time::Instant::now();
  let result = wait_until_ready(
    &client,
    300.milliseconds(),
    &ReadyOptions {
      probe_timeout: 50.milliseconds(),
      tick_interval: 100.milliseconds(),
    },
    shutdown_trigger.make_shutdown(),
  )
  .await;
  assert_matches!(result, Err(ReadyError::DeadlineExceeded));
  assert!(start.elapsed() >= std::time::Duration::from_millis(250));
  assert!(start.elapsed() < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn wait_until_ready_stops_on_shutdown() {
  let client = make_client(dead_address().await);
  let shutdown_trigger = ShutdownTrigger::default();
  let shutdown = shutdown_trigger.make_shutdown();

  tokio::spawn(async move {
    100.milliseconds().sleep().await;
    shutdown_trigger.shutdown().await;
  });

  let result = wait_until_ready(&client, 30.seconds(), &ReadyOptions::default(), shutdown).await;
  assert_matches!(result, Err(ReadyError::Cancelled));
}
