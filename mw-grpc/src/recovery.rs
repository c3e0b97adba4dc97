// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::error::{Error, Result};
use crate::interceptor::{
  CallDescriptor,
  StreamInterceptor,
  StreamNext,
  UnaryInterceptor,
  UnaryNext,
};
use crate::status::{Code, Status};
use crate::stream::CallStream;
use async_trait::async_trait;
use futures::FutureExt;
use http::Extensions;
use mw_server_stats::stats::Scope;
use prometheus::IntCounter;
use std::panic::AssertUnwindSafe;

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
  panic
    .downcast_ref::<&'static str>()
    .copied()
    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("unknown panic")
}

//
// RecoveryInterceptor
//

// Catches panics from everything below it in the chain and converts them into an internal gRPC
// error so the connection and its sibling calls survive. Placed innermost in the standard chain
// so logging and metrics account the synthesized outcome.
pub struct RecoveryInterceptor {
  panics_recovered_total: IntCounter,
}

impl RecoveryInterceptor {
  #[must_use]
  pub fn new(scope: &Scope) -> Self {
    Self {
      panics_recovered_total: scope.counter("panics_recovered_total"),
    }
  }

  fn recover<T>(
    &self,
    call: &CallDescriptor,
    result: std::result::Result<Result<T>, Box<dyn std::any::Any + Send>>,
  ) -> Result<T> {
    match result {
      Ok(result) => result,
      Err(panic) => {
        let message = panic_message(panic.as_ref());
        log::error!("panic in {} handler: {message}", call.path());
        self.panics_recovered_total.inc();
        Err(Error::Grpc(Status::new(
          Code::Internal,
          format!("panic: {message}"),
        )))
      },
    }
  }
}

#[async_trait]
impl<ResultType: Send + 'static> UnaryInterceptor<ResultType> for RecoveryInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    context: Extensions,
    next: UnaryNext<'_, ResultType>,
  ) -> Result<ResultType> {
    let result = AssertUnwindSafe(next.run(call, context)).catch_unwind().await;
    self.recover(call, result)
  }
}

#[async_trait]
impl StreamInterceptor for RecoveryInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    stream: Box<dyn CallStream>,
    next: StreamNext<'_>,
  ) -> Result<()> {
    let result = AssertUnwindSafe(next.run(call, stream)).catch_unwind().await;
    self.recover(call, result)
  }
}
