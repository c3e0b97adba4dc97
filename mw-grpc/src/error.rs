// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::status::{Code, Status};
use axum::BoxError;
use axum::response::{IntoResponse, Response};

//
// Error
//

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Body stream error occurred: {0}")]
  BodyStream(BoxError),
  #[error("Stream has closed")]
  Closed,
  #[error("A codec error occurred: {0}")]
  Codec(#[from] mw_grpc_codec::Error),
  #[error("A connection timeout occurred")]
  ConnectionTimeout,
  #[error("A gRPC error occurred: {0}")]
  Grpc(#[from] Status),
  #[error("A hyper client error occurred: {0}")]
  HyperClient(#[from] hyper_util::client::legacy::Error),
  #[error("A request timeout occurred")]
  RequestTimeout,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
  // The gRPC code an interceptor or a caller should see for this error.
  #[must_use]
  pub fn code(&self) -> Code {
    match self {
      Self::Grpc(status) => status.code,
      Self::RequestTimeout => Code::DeadlineExceeded,
      Self::ConnectionTimeout => Code::Unavailable,
      Self::Codec(_) => Code::InvalidArgument,
      Self::Closed => Code::Cancelled,
      Self::BodyStream(_) | Self::HyperClient(_) => Code::Internal,
    }
  }

  #[must_use]
  pub fn into_status(self) -> Status {
    match self {
      Self::Grpc(status) => status,
      other => {
        let code = other.code();
        Status::new(code, other.to_string())
      },
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    self.into_status().into_response()
  }
}
