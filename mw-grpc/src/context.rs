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
};
use crate::stream::CallStream;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Extensions, HeaderMap};

//
// ContextInterceptor
//

/// Applies a mutation to the call context before the rest of the chain runs. For unary calls the
/// context is owned and mutated in place; for streaming calls the stream is wrapped in a decorator
/// that serves the mutated context, since the underlying stream is shared with the transport.
pub struct ContextInterceptor {
  mutator: Box<dyn Fn(&mut Extensions) + Send + Sync>,
}

impl ContextInterceptor {
  #[must_use]
  pub fn new(mutator: impl Fn(&mut Extensions) + Send + Sync + 'static) -> Self {
    Self {
      mutator: Box::new(mutator),
    }
  }
}

#[async_trait]
impl<ResultType: Send + 'static> UnaryInterceptor<ResultType> for ContextInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    mut context: Extensions,
    next: UnaryNext<'_, ResultType>,
  ) -> Result<ResultType> {
    (self.mutator)(&mut context);
    next.run(call, context).await
  }
}

#[async_trait]
impl StreamInterceptor for ContextInterceptor {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    stream: Box<dyn CallStream>,
    next: StreamNext<'_>,
  ) -> Result<()> {
    let mut context = stream.context().clone();
    (self.mutator)(&mut context);
    next
      .run(call, Box::new(MutatedStream::new(stream, context)))
      .await
  }
}

//
// MutatedStream
//

// Stream decorator that overrides only the context; headers and frame delivery delegate to the
// wrapped stream.
struct MutatedStream {
  inner: Box<dyn CallStream>,
  context: Extensions,
}

impl MutatedStream {
  fn new(inner: Box<dyn CallStream>, context: Extensions) -> Self {
    Self { inner, context }
  }
}

#[async_trait]
impl CallStream for MutatedStream {
  fn headers(&self) -> &HeaderMap {
    self.inner.headers()
  }

  fn context(&self) -> &Extensions {
    &self.context
  }

  async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
    self.inner.send_frame(frame).await
  }
}
