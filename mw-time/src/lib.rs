// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt


use std::future::{Future, IntoFuture};
use tokio::time::{Interval, Timeout, interval};

//
// TimeDurationExt
//

/// Bridges `time::Duration` into the tokio clock APIs, which all take the unsigned
/// `std::time::Duration`.
pub trait TimeDurationExt {
  fn sleep(self) -> impl Future<Output = ()>;
  fn interval(self) -> Interval;
  fn timeout<F: IntoFuture>(self, f: F) -> Timeout<F::IntoFuture>;
}

impl TimeDurationExt for time::Duration {
  fn sleep(self) -> impl Future<Output = ()> {
    tokio::time::sleep(self.unsigned_abs())
  }

  fn interval(self) -> Interval {
    interval(self.unsigned_abs())
  }

  fn timeout<F: IntoFuture>(self, f: F) -> Timeout<F::IntoFuture> {
    tokio::time::timeout(self.unsigned_abs(), f)
  }
}
