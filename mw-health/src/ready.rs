// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::{CheckRequest, ServingStatus, check_method};
use hyper_util::client::legacy::connect::Connect;
use mw_grpc::client::Client;
use mw_shutdown::Shutdown;
use mw_time::TimeDurationExt;
use time::Duration;
use time::ext::NumericalDuration;
use tokio::time::MissedTickBehavior;

//
// ReadyOptions
//

// Tuning for readiness polling. Defaults suit waiting on a process that is expected to come up
// within a few seconds, such as an envoy sidecar.
#[derive(Clone, Debug)]
pub struct ReadyOptions {
  pub probe_timeout: Duration,
  pub tick_interval: Duration,
}

impl Default for ReadyOptions {
  fn default() -> Self {
    Self {
      probe_timeout: 1.seconds(),
      tick_interval: 1.seconds(),
    }
  }
}

//
// ReadyError
//

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReadyError {
  #[error("readiness wait cancelled by shutdown")]
  Cancelled,
  #[error("deadline exceeded while waiting for readiness")]
  DeadlineExceeded,
}

// Probe the health Check method once. Anything other than a timely serving response counts as
// not ready.
pub async fn is_ready<C: Connect + Clone + Send + Sync + 'static>(
  client: &Client<C>,
  probe_timeout: Duration,
) -> bool {
  client
    .unary(&check_method(), None, CheckRequest::default(), probe_timeout)
    .await
    .is_ok_and(|response| response.status == ServingStatus::Serving)
}

// Poll the health Check method until it reports serving, the deadline passes, or shutdown is
// signaled. The first probe fires immediately.
pub async fn wait_until_ready<C: Connect + Clone + Send + Sync + 'static>(
  client: &Client<C>,
  deadline: Duration,
  options: &ReadyOptions,
  mut shutdown: Shutdown,
) -> Result<(), ReadyError> {
  let mut ticker = options.tick_interval.interval();
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  let deadline_sleep = deadline.sleep();
  tokio::pin!(deadline_sleep);

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        if is_ready(client, options.probe_timeout).await {
          return Ok(());
        }
        log::debug!("target not ready, will retry in {}", options.tick_interval);
      },
      () = shutdown.cancelled() => return Err(ReadyError::Cancelled),
      () = &mut deadline_sleep => return Err(ReadyError::DeadlineExceeded),
    }
  }
}
