// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::error::{Error, Result};
use crate::status::Status;
use crate::{BodySender, GRPC_MESSAGE, GRPC_STATUS};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderValue};
use http_body::Frame;
use mw_grpc_codec::Encoder;
use serde::Serialize;

//
// CallStream
//

/// Payload-erased handle for an open server stream. Interceptors see this trait so they can
/// observe and decorate streams without knowing the message type; handlers use the typed
/// [`StreamingSender`] facade instead.
#[async_trait]
pub trait CallStream: Send {
  fn headers(&self) -> &HeaderMap;
  fn context(&self) -> &Extensions;
  async fn send_frame(&mut self, frame: Bytes) -> Result<()>;
}

//
// ServerCallStream
//

// The root stream handle created by the streaming router, writing data frames into the response
// body channel.
pub struct ServerCallStream {
  tx: BodySender,
  headers: HeaderMap,
  context: Extensions,
}

impl ServerCallStream {
  #[must_use]
  pub fn new(tx: BodySender, headers: HeaderMap, context: Extensions) -> Self {
    Self {
      tx,
      headers,
      context,
    }
  }
}

#[async_trait]
impl CallStream for ServerCallStream {
  fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  fn context(&self) -> &Extensions {
    &self.context
  }

  async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
    self
      .tx
      .send(Ok(Frame::data(frame)))
      .await
      .map_err(|_| Error::Closed)
  }
}

//
// StreamingSender
//

// Typed sender handed to streaming handlers. Context and header access go through the stream
// handle so any decoration applied by interceptors is visible here.
pub struct StreamingSender<ResponseType: Serialize> {
  stream: Box<dyn CallStream>,
  encoder: Encoder<ResponseType>,
}

impl<ResponseType: Serialize> StreamingSender<ResponseType> {
  #[must_use]
  pub fn new(stream: Box<dyn CallStream>) -> Self {
    Self {
      stream,
      encoder: Encoder::new(),
    }
  }

  #[must_use]
  pub fn headers(&self) -> &HeaderMap {
    self.stream.headers()
  }

  #[must_use]
  pub fn context(&self) -> &Extensions {
    self.stream.context()
  }

  // Send a message on the stream.
  pub async fn send(&mut self, message: &ResponseType) -> Result<()> {
    let encoded = self.encoder.encode(message)?;
    self.stream.send_frame(encoded).await
  }
}

async fn send_trailers(tx: &BodySender, trailers: HeaderMap) -> Result<()> {
  tx.send(Ok(Frame::trailers(trailers)))
    .await
    .map_err(|_| Error::Closed)
}

// Send grpc-status: 0 to indicate success once a stream stops without error.
pub(crate) async fn send_ok_trailers(tx: &BodySender) -> Result<()> {
  log::trace!("sending ok trailers for stream");
  let mut trailers = HeaderMap::new();
  trailers.insert(GRPC_STATUS, HeaderValue::from_static("0"));

  send_trailers(tx, trailers).await
}

pub(crate) async fn send_error_trailers(tx: &BodySender, status: Status) -> Result<()> {
  log::trace!("sending error trailers for stream");

  let mut trailers = HeaderMap::new();
  trailers.insert(
    GRPC_STATUS,
    HeaderValue::from_str(&status.code.to_int().to_string()).unwrap(),
  );
  if let Some(message) = status.message {
    let encoded = urlencoding::encode(&message);
    trailers.insert(GRPC_MESSAGE, HeaderValue::from_str(&encoded).unwrap());
  }

  send_trailers(tx, trailers).await
}
