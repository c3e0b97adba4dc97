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
use crate::status::Code;
use crate::stream::CallStream;
use async_trait::async_trait;
use http::Extensions;
use std::sync::Arc;

// The level a finished call is logged at. Expected outcomes stay at debug so steady state noise
// (health probes, client-side deadlines) does not flood the logs.
#[must_use]
pub const fn severity(code: Code) -> log::Level {
  match code {
    Code::Ok | Code::DeadlineExceeded => log::Level::Debug,
    _ => log::Level::Error,
  }
}

//
// CallEvent
//

#[derive(Debug)]
pub enum CallEvent {
  Started,
  Finished {
    code: Code,
    elapsed: std::time::Duration,
  },
}

//
// CallLogger
//

// Sink for call lifecycle events. The default implementation forwards to the log facade; tests
// substitute a capturing implementation.
pub trait CallLogger: Send + Sync {
  fn log(&self, level: log::Level, call: &CallDescriptor, event: &CallEvent);
}

//
// LogCallLogger
//

#[derive(Default)]
pub struct LogCallLogger;

impl CallLogger for LogCallLogger {
  fn log(&self, level: log::Level, call: &CallDescriptor, event: &CallEvent) {
    match event {
      CallEvent::Started => {
        log::log!(level, "{} call {} started", call.kind(), call.path());
      },
      CallEvent::Finished { code, elapsed } => {
        log::log!(
          level,
          "{} call {} finished: {} in {elapsed:?}",
          call.kind(),
          call.path(),
          code.as_str(),
        );
      },
    }
  }
}

//
// LoggingInterceptor
//

// Logs the start and finish of every call. Start events are always debug; finish severity follows
// the outcome code.
pub struct LoggingInterceptor {
  logger: Arc<dyn CallLogger>,
}

impl LoggingInterceptor {
  #[must_use]
  pub fn new(logger: Arc<dyn CallLogger>) -> Self {
    Self { logger }
  }

  fn finish<T>(&self, call: &CallDescriptor, result: &Result<T>) {
    let code = outcome_code(result);
    self.logger.log(
      severity(code),
      call,
      &CallEvent::Finished {
        code,
        elapsed: call.elapsed(),
      },
    );
  }
}

#[async_trait]
impl<ResultType: Send + 'static> UnaryInterceptor<ResultType> for LoggingInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    context: Extensions,
    next: UnaryNext<'_, ResultType>,
  ) -> Result<ResultType> {
    self.logger.log(log::Level::Debug, call, &CallEvent::Started);
    let result = next.run(call, context).await;
    self.finish(call, &result);
    result
  }
}

#[async_trait]
impl StreamInterceptor for LoggingInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    stream: Box<dyn CallStream>,
    next: StreamNext<'_>,
  ) -> Result<()> {
    self.logger.log(log::Level::Debug, call, &CallEvent::Started);
    let result = next.run(call, stream).await;
    self.finish(call, &result);
    result
  }
}
