// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt



pub mod client;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod service;
pub mod status;
pub mod stream;

use crate::error::{Error, Result};
use crate::interceptor::{CallDescriptor, CallKind, ServerInterceptors};
use crate::service::ServiceMethod;
use crate::status::{Code, Status};
use crate::stream::{ServerCallStream, StreamingSender, send_error_trailers, send_ok_trailers};
use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{BoxError, Router};
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderValue};
use http_body::Frame;
use http_body_util::StreamBody;
use mw_grpc_codec::{Decoder, Encoder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub(crate) const GRPC_STATUS: &str = "grpc-status";
pub(crate) const GRPC_MESSAGE: &str = "grpc-message";
pub const CONTENT_TYPE_GRPC: &str = "application/grpc";
pub(crate) const TRANSFER_ENCODING: &str = "te";
pub(crate) const TRANSFER_ENCODING_TRAILERS: &str = "trailers";

pub type BodySender = mpsc::Sender<std::result::Result<Frame<Bytes>, BoxError>>;

// Create a new successful axum gRPC response with a given body.
#[must_use]
pub fn new_grpc_response(body: Body) -> Response {
  Response::builder()
    .header(http::header::CONTENT_TYPE, CONTENT_TYPE_GRPC)
    .body(body)
    .unwrap()
}

// Handler for a unary API.
#[async_trait::async_trait]
pub trait Handler<RequestType: Send, ResponseType>: Send + Sync {
  async fn handle(
    &self,
    headers: HeaderMap,
    context: Extensions,
    request: RequestType,
  ) -> Result<ResponseType>;
}

// Handler for a server streaming API. Request headers and the call context are available through
// the sender.
#[async_trait::async_trait]
pub trait ServerStreamingHandler<ResponseType: Serialize + Send + 'static, RequestType: Send>:
  Send + Sync
{
  async fn stream(
    &self,
    request: RequestType,
    sender: &mut StreamingSender<ResponseType>,
  ) -> Result<()>;
}

async fn decode_request<RequestType: DeserializeOwned>(
  request: Request,
) -> Result<(HeaderMap<HeaderValue>, Extensions, RequestType)> {
  let (parts, body) = request.into_parts();
  let body_bytes = to_bytes(body, usize::MAX)
    .await
    .map_err(|e| Error::BodyStream(e.into()))?;

  let mut decoder = Decoder::default();
  let mut messages = decoder.decode_data(&body_bytes)?;
  if messages.len() != 1 {
    return Err(Status::new(Code::InvalidArgument, "Invalid request body").into());
  }

  Ok((parts.headers, parts.extensions, messages.remove(0)))
}

// Encode a unary response body: one data frame followed by grpc-status: 0 trailers.
fn encode_unary_response<ResponseType: Serialize>(response: &ResponseType) -> Result<Response> {
  let mut encoder = Encoder::new();
  let encoded = encoder.encode(response)?;

  let mut trailers = HeaderMap::new();
  trailers.insert(GRPC_STATUS, HeaderValue::from_static("0"));

  let frames: Vec<std::result::Result<Frame<Bytes>, Infallible>> =
    vec![Ok(Frame::data(encoded)), Ok(Frame::trailers(trailers))];
  Ok(new_grpc_response(Body::new(StreamBody::new(
    futures::stream::iter(frames),
  ))))
}

// Create an axum router for a unary request and a handler. The request is decoded before the
// interceptor chain runs; the chain wraps the handler invocation and response encoding.
pub fn make_unary_router<RequestType, ResponseType>(
  service_method: &ServiceMethod<RequestType, ResponseType>,
  handler: Arc<dyn Handler<RequestType, ResponseType>>,
  interceptors: ServerInterceptors,
) -> Router
where
  RequestType: DeserializeOwned + Send + 'static,
  ResponseType: Serialize + Send + 'static,
{
  let full_path = Arc::new(service_method.full_path());
  Router::new().route(
    &service_method.full_path(),
    post(move |request: Request| {
      let handler = handler.clone();
      let interceptors = interceptors.clone();
      let full_path = full_path.clone();
      async move {
        let call = CallDescriptor::new(full_path.as_str(), CallKind::Unary);
        let (headers, context, message) = match decode_request::<RequestType>(request).await {
          Ok(decoded) => decoded,
          Err(e) => return e.into_response(),
        };

        let result = interceptors
          .unary
          .intercept(
            &call,
            context,
            Box::new(move |context| {
              Box::pin(async move {
                let response = handler.handle(headers, context, message).await?;
                encode_unary_response(&response)
              })
            }),
          )
          .await;

        match result {
          Ok(response) => response,
          Err(e) => e.into_response(),
        }
      }
    }),
  )
}

// Create an axum router for a one directional streaming handler. The chain runs for the lifetime
// of the stream inside a spawned task; trailers are written once it finishes either way.
pub fn make_server_streaming_router<RequestType, ResponseType>(
  service_method: &ServiceMethod<RequestType, ResponseType>,
  handler: Arc<dyn ServerStreamingHandler<ResponseType, RequestType>>,
  interceptors: ServerInterceptors,
) -> Router
where
  RequestType: DeserializeOwned + Send + 'static,
  ResponseType: Serialize + Send + 'static,
{
  let full_path = Arc::new(service_method.full_path());
  Router::new().route(
    &service_method.full_path(),
    post(move |request: Request| {
      let handler = handler.clone();
      let interceptors = interceptors.clone();
      let full_path = full_path.clone();
      async move {
        let call = CallDescriptor::new(full_path.as_str(), CallKind::ServerStream);
        let (headers, context, message) = match decode_request::<RequestType>(request).await {
          Ok(decoded) => decoded,
          Err(e) => return e.into_response(),
        };

        let (tx, rx) = mpsc::channel(1);
        let trailers_tx = tx.clone();
        tokio::spawn(async move {
          let stream = Box::new(ServerCallStream::new(tx, headers, context));
          let result = interceptors
            .streaming
            .intercept(
              &call,
              stream,
              Box::new(move |stream| {
                Box::pin(async move {
                  let mut sender = StreamingSender::new(stream);
                  handler.stream(message, &mut sender).await
                })
              }),
            )
            .await;

          // Trailer sends can fail if the client has disconnected. There is nothing more to do
          // at that point so the error is ignored.
          match result {
            Ok(()) => {
              let _ignored = send_ok_trailers(&trailers_tx).await;
            },
            Err(e) => {
              log::debug!("stream {} failed: {e}", call.path());
              let _ignored = send_error_trailers(&trailers_tx, e.into_status()).await;
            },
          }
        });

        new_grpc_response(Body::new(StreamBody::new(ReceiverStream::new(rx))))
      }
    }),
  )
}
