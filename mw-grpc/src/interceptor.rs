// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::context::ContextInterceptor;
use crate::error::Result;
use crate::logging::{CallLogger, LoggingInterceptor};
use crate::metrics::{MetricsInterceptor, RpcStats};
use crate::recovery::RecoveryInterceptor;
use crate::status::Code;
use crate::stream::CallStream;
use async_trait::async_trait;
use axum::response::Response;
use futures::future::BoxFuture;
use http::Extensions;
use hyper::body::Incoming;
use mw_server_stats::stats::Scope;
use std::sync::Arc;

//
// CallKind
//

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CallKind {
  Unary,
  ClientStream,
  ServerStream,
  BidiStream,
}

impl std::fmt::Display for CallKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Unary => "unary",
      Self::ClientStream => "client_stream",
      Self::ServerStream => "server_stream",
      Self::BidiStream => "bidi_stream",
    })
  }
}

//
// CallDescriptor
//

// Immutable description of an in-flight call, shared by every interceptor in a chain. The start
// time is captured at construction, before any interceptor runs.
#[derive(Clone, Debug)]
pub struct CallDescriptor {
  path: String,
  kind: CallKind,
  started_at: std::time::Instant,
}

impl CallDescriptor {
  #[must_use]
  pub fn new(path: impl Into<String>, kind: CallKind) -> Self {
    Self {
      path: path.into(),
      kind,
      started_at: std::time::Instant::now(),
    }
  }

  #[must_use]
  pub fn path(&self) -> &str {
    &self.path
  }

  #[must_use]
  pub const fn kind(&self) -> CallKind {
    self.kind
  }

  #[must_use]
  pub fn elapsed(&self) -> std::time::Duration {
    self.started_at.elapsed()
  }
}

// The code an interceptor reports for a finished call.
#[must_use]
pub fn outcome_code<T>(result: &Result<T>) -> Code {
  match result {
    Ok(_) => Code::Ok,
    Err(e) => e.code(),
  }
}

//
// UnaryInterceptor
//

pub type UnaryTerminal<'a, ResultType> =
  Box<dyn FnOnce(Extensions) -> BoxFuture<'a, Result<ResultType>> + Send + 'a>;

/// An interceptor around a unary call. `ResultType` is the transport-level value produced when the
/// call completes (an axum response on the server, a hyper response on the client). Interceptors
/// run in chain order around `next`, may mutate the call context, and see the outcome of
/// everything below them.
#[async_trait]
pub trait UnaryInterceptor<ResultType: Send + 'static>: Send + Sync {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    context: Extensions,
    next: UnaryNext<'_, ResultType>,
  ) -> Result<ResultType>;
}

//
// UnaryNext
//

// The remainder of a chain below the current interceptor. Calling run() continues the chain;
// dropping it without running short circuits the call.
pub struct UnaryNext<'a, ResultType> {
  interceptors: &'a [Arc<dyn UnaryInterceptor<ResultType>>],
  terminal: UnaryTerminal<'a, ResultType>,
}

impl<ResultType: Send + 'static> UnaryNext<'_, ResultType> {
  pub async fn run(self, call: &CallDescriptor, context: Extensions) -> Result<ResultType> {
    match self.interceptors.split_first() {
      Some((head, rest)) => {
        head
          .intercept(
            call,
            context,
            UnaryNext {
              interceptors: rest,
              terminal: self.terminal,
            },
          )
          .await
      },
      None => (self.terminal)(context).await,
    }
  }
}

//
// InterceptorChain
//

// An immutable, cheaply clonable chain of unary interceptors. An empty chain is the identity: the
// terminal runs with the context untouched.
pub struct InterceptorChain<ResultType> {
  interceptors: Arc<[Arc<dyn UnaryInterceptor<ResultType>>]>,
}

// Manual impl as deriving would bound ResultType: Clone, which transport response types do not
// satisfy. Cloning only bumps the Arc.
impl<ResultType> Clone for InterceptorChain<ResultType> {
  fn clone(&self) -> Self {
    Self {
      interceptors: self.interceptors.clone(),
    }
  }
}

impl<ResultType: Send + 'static> InterceptorChain<ResultType> {
  #[must_use]
  pub fn new(interceptors: Vec<Arc<dyn UnaryInterceptor<ResultType>>>) -> Self {
    Self {
      interceptors: interceptors.into(),
    }
  }

  pub async fn intercept<'a>(
    &'a self,
    call: &CallDescriptor,
    context: Extensions,
    terminal: UnaryTerminal<'a, ResultType>,
  ) -> Result<ResultType> {
    UnaryNext {
      interceptors: &self.interceptors,
      terminal,
    }
    .run(call, context)
    .await
  }
}

//
// StreamInterceptor
//

pub type StreamTerminal<'a> =
  Box<dyn FnOnce(Box<dyn CallStream>) -> BoxFuture<'a, Result<()>> + Send + 'a>;

/// An interceptor around a streaming call. The stream handle is threaded through the chain by
/// value so an interceptor can substitute a decorated stream for everything below it.
#[async_trait]
pub trait StreamInterceptor: Send + Sync {
  async fn intercept(
    &self,
    call: &CallDescriptor,
    stream: Box<dyn CallStream>,
    next: StreamNext<'_>,
  ) -> Result<()>;
}

//
// StreamNext
//

pub struct StreamNext<'a> {
  interceptors: &'a [Arc<dyn StreamInterceptor>],
  terminal: StreamTerminal<'a>,
}

impl StreamNext<'_> {
  pub async fn run(self, call: &CallDescriptor, stream: Box<dyn CallStream>) -> Result<()> {
    match self.interceptors.split_first() {
      Some((head, rest)) => {
        head
          .intercept(
            call,
            stream,
            StreamNext {
              interceptors: rest,
              terminal: self.terminal,
            },
          )
          .await
      },
      None => (self.terminal)(stream).await,
    }
  }
}

//
// StreamInterceptorChain
//

#[derive(Clone)]
pub struct StreamInterceptorChain {
  interceptors: Arc<[Arc<dyn StreamInterceptor>]>,
}

impl StreamInterceptorChain {
  #[must_use]
  pub fn new(interceptors: Vec<Arc<dyn StreamInterceptor>>) -> Self {
    Self {
      interceptors: interceptors.into(),
    }
  }

  pub async fn intercept<'a>(
    &'a self,
    call: &CallDescriptor,
    stream: Box<dyn CallStream>,
    terminal: StreamTerminal<'a>,
  ) -> Result<()> {
    StreamNext {
      interceptors: &self.interceptors,
      terminal,
    }
    .run(call, stream)
    .await
  }
}

//
// ServerInterceptors
//

// The interceptor chains applied to every server route.
#[derive(Clone)]
pub struct ServerInterceptors {
  pub unary: InterceptorChain<Response>,
  pub streaming: StreamInterceptorChain,
}

impl ServerInterceptors {
  // The standard server chain: logging, then metrics, then panic recovery. Recovery sits
  // innermost so logging and metrics observe the synthesized internal error rather than an
  // unwinding handler.
  #[must_use]
  pub fn standard(scope: &Scope, logger: Arc<dyn CallLogger>) -> Self {
    let logging = Arc::new(LoggingInterceptor::new(logger));
    let metrics = Arc::new(MetricsInterceptor::new(RpcStats::new(scope)));
    let recovery = Arc::new(RecoveryInterceptor::new(scope));
    Self {
      unary: InterceptorChain::new(vec![
        logging.clone(),
        metrics.clone(),
        recovery.clone(),
      ]),
      streaming: StreamInterceptorChain::new(vec![logging, metrics, recovery]),
    }
  }

  // The standard chain with a context mutator appended innermost, so the mutated context is
  // visible to handlers but outcome accounting is unaffected.
  #[must_use]
  pub fn standard_with_context(
    scope: &Scope,
    logger: Arc<dyn CallLogger>,
    context: Arc<ContextInterceptor>,
  ) -> Self {
    let logging = Arc::new(LoggingInterceptor::new(logger));
    let metrics = Arc::new(MetricsInterceptor::new(RpcStats::new(scope)));
    let recovery = Arc::new(RecoveryInterceptor::new(scope));
    Self {
      unary: InterceptorChain::new(vec![
        logging.clone(),
        metrics.clone(),
        recovery.clone(),
        context.clone(),
      ]),
      streaming: StreamInterceptorChain::new(vec![logging, metrics, recovery, context]),
    }
  }

  // No interceptors at all. Calls run as if the chains were not there.
  #[must_use]
  pub fn none() -> Self {
    Self {
      unary: InterceptorChain::new(Vec::new()),
      streaming: StreamInterceptorChain::new(Vec::new()),
    }
  }
}

//
// ClientInterceptors
//

// The interceptor chain applied to every client call. Both unary calls and stream establishment
// produce a hyper response, so a single chain type covers both; for streaming calls the finish
// event corresponds to response headers being received.
#[derive(Clone)]
pub struct ClientInterceptors {
  pub unary: InterceptorChain<http::Response<Incoming>>,
  pub streaming: InterceptorChain<http::Response<Incoming>>,
}

impl ClientInterceptors {
  // The standard client chain: logging then metrics. There is no recovery unit on the client as
  // nothing user-provided runs inside the chain.
  #[must_use]
  pub fn standard(scope: &Scope, logger: Arc<dyn CallLogger>) -> Self {
    let logging = Arc::new(LoggingInterceptor::new(logger));
    let metrics = Arc::new(MetricsInterceptor::new(RpcStats::new(scope)));
    Self {
      unary: InterceptorChain::new(vec![logging.clone(), metrics.clone()]),
      streaming: InterceptorChain::new(vec![logging, metrics]),
    }
  }

  #[must_use]
  pub fn none() -> Self {
    Self {
      unary: InterceptorChain::new(Vec::new()),
      streaming: InterceptorChain::new(Vec::new()),
    }
  }
}
