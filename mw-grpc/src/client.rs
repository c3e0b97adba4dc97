// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::error::{Error, Result};
use crate::interceptor::{CallDescriptor, CallKind, ClientInterceptors};
use crate::service::ServiceMethod;
use crate::status::{Code, Status};
use crate::{GRPC_MESSAGE, GRPC_STATUS, TRANSFER_ENCODING, TRANSFER_ENCODING_TRAILERS};
use axum::body::Body;
use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, Uri};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::TokioExecutor;
use mw_grpc_codec::{Decoder, Encoder};
use mw_time::TimeDurationExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::io::ErrorKind;
use time::Duration;
use tokio::sync::Semaphore;

//
// AddressHelper
//

#[derive(Debug)]
pub struct AddressHelper {
  address: Uri,
}

impl AddressHelper {
  pub fn new<E: Send + Sync + std::error::Error + 'static>(
    address: impl TryInto<Uri, Error = E>,
  ) -> anyhow::Result<Self> {
    let address: Uri = address.try_into()?;

    // These are unwrapped later on to construct the full URI, so bail early if they are not set.
    if address.scheme().is_none() {
      anyhow::bail!("missing scheme in address");
    }

    if address.authority().is_none() {
      anyhow::bail!("missing authority in address");
    }

    // These are dropped when constructing the final URI, so providing them likely indicates a bug.
    if address.path() != "/" {
      anyhow::bail!(
        "extra path parameter not supported in address: {}",
        address.path()
      );
    }

    if address.query().is_some() {
      anyhow::bail!("extra query parameter not supported in address");
    }

    Ok(Self { address })
  }

  #[must_use]
  pub fn build(&self, full_path: &str) -> Uri {
    Uri::builder()
      .scheme(self.address.scheme().unwrap().clone())
      .authority(self.address.authority().unwrap().as_str())
      .path_and_query(full_path)
      .build()
      .unwrap()
  }
}

//
// Client
//

// A simple gRPC client wrapper that allows for both unary and streaming requests. Every call runs
// through the client interceptor chains.
pub struct Client<C> {
  client: hyper_util::client::legacy::Client<C, Body>,
  address: AddressHelper,
  concurrency: Semaphore,
  interceptors: ClientInterceptors,
}

impl Client<HttpConnector> {
  // Creates a new client against a target address using HTTP over a TCP socket.
  pub fn new_http(
    address: &str,
    connect_timeout: Duration,
    max_request_concurrency: u64,
    interceptors: ClientInterceptors,
  ) -> anyhow::Result<Self> {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    connector.set_connect_timeout(Some(connect_timeout.unsigned_abs()));

    Self::new_with_client(
      format!("http://{address}"),
      hyper_util::client::legacy::Client::builder(TokioExecutor::new())
        .http2_only(true)
        .build(connector),
      max_request_concurrency,
      interceptors,
    )
  }
}

impl<C: Connect + Clone + Send + Sync + 'static> Client<C> {
  // Create a new client against a target address.
  pub fn new_with_client<E: Send + Sync + std::error::Error + 'static>(
    address: impl TryInto<Uri, Error = E>,
    client: hyper_util::client::legacy::Client<C, Body>,
    max_request_concurrency: u64,
    interceptors: ClientInterceptors,
  ) -> anyhow::Result<Self> {
    Ok(Self {
      client,
      address: AddressHelper::new(address)?,
      concurrency: Semaphore::new(max_request_concurrency.try_into().unwrap()),
      interceptors,
    })
  }

  // Common request generation for both unary and streaming requests.
  async fn common_request(
    &self,
    full_path: &str,
    extra_headers: Option<HeaderMap>,
    body: Body,
  ) -> Result<http::Response<Incoming>> {
    let _permit = self.concurrency.acquire().await.unwrap();

    let uri = self.address.build(full_path);
    let mut request = hyper::Request::builder()
      .method(hyper::Method::POST)
      .uri(uri)
      .header(CONTENT_TYPE, crate::CONTENT_TYPE_GRPC)
      .header(TRANSFER_ENCODING, TRANSFER_ENCODING_TRAILERS)
      .body(body)
      .unwrap();
    if let Some(extra_headers) = extra_headers {
      request.headers_mut().extend(extra_headers);
    }

    let response = match self.client.request(request).await {
      Ok(response) => response,
      Err(e) => {
        // Connect timeouts surface as an io error nested two sources deep in the legacy client
        // error, so dig it out to report something actionable.
        if e
          .source()
          .and_then(StdError::source)
          .and_then(|e| e.downcast_ref::<std::io::Error>())
          .is_some_and(|e| e.kind() == ErrorKind::TimedOut)
        {
          return Err(Error::ConnectionTimeout);
        }

        return Err(e.into());
      },
    };
    if !response.status().is_success() {
      return Err(
        Status::new(
          Code::Internal,
          format!("Non-200 response code: {}", response.status()),
        )
        .into(),
      );
    }

    // We treat any trailer only response as an error, even when the response status is OK.
    if response.headers().contains_key(GRPC_STATUS) {
      return Err(Status::from_headers(response.headers()).into());
    }

    Ok(response)
  }

  // Perform a unary request. The request timeout runs inside the interceptor chain, so
  // interceptors observe a deadline exceeded outcome when it fires.
  pub async fn unary<RequestType, ResponseType>(
    &self,
    service_method: &ServiceMethod<RequestType, ResponseType>,
    extra_headers: Option<HeaderMap>,
    request: RequestType,
    request_timeout: Duration,
  ) -> Result<ResponseType>
  where
    RequestType: Serialize,
    ResponseType: DeserializeOwned,
  {
    let full_path = service_method.full_path();
    let call = CallDescriptor::new(full_path.as_str(), CallKind::Unary);
    let mut encoder = Encoder::new();
    let body: Body = encoder.encode(&request)?.into();

    let response = self
      .interceptors
      .unary
      .intercept(
        &call,
        Extensions::new(),
        Box::new(move |_context| {
          Box::pin(async move {
            match request_timeout
              .timeout(self.common_request(&full_path, extra_headers, body))
              .await
            {
              Ok(response) => response,
              Err(_) => Err(Error::RequestTimeout),
            }
          })
        }),
      )
      .await?;

    let body = response
      .into_body()
      .collect()
      .await
      .map_err(|e| Error::BodyStream(e.into()))?
      .to_bytes();
    let mut decoder: Decoder<ResponseType> = Decoder::default();
    let mut messages = decoder.decode_data(&body)?;

    if messages.len() != 1 {
      return Err(Status::new(Code::Internal, "Invalid response body").into());
    }

    Ok(messages.remove(0))
  }

  // Perform a server streaming request. The interceptor chain wraps stream establishment; the
  // finish event fires once response headers have been received.
  pub async fn server_streaming<RequestType, ResponseType>(
    &self,
    service_method: &ServiceMethod<RequestType, ResponseType>,
    extra_headers: Option<HeaderMap>,
    request: RequestType,
  ) -> Result<ServerStreamingApi<ResponseType>>
  where
    RequestType: Serialize,
    ResponseType: DeserializeOwned,
  {
    let full_path = service_method.full_path();
    let call = CallDescriptor::new(full_path.as_str(), CallKind::ServerStream);
    let mut encoder = Encoder::new();
    let body: Body = encoder.encode(&request)?.into();

    let response = self
      .interceptors
      .streaming
      .intercept(
        &call,
        Extensions::new(),
        Box::new(move |_context| {
          Box::pin(async move { self.common_request(&full_path, extra_headers, body).await })
        }),
      )
      .await?;

    let (parts, body) = response.into_parts();
    Ok(ServerStreamingApi::new(parts.headers, Body::new(body)))
  }
}

//
// ServerStreamingApi
//

// Handle around an API stream where the server is streaming responses.
pub struct ServerStreamingApi<IncomingType: DeserializeOwned> {
  headers: HeaderMap,
  body: Body,
  decoder: Decoder<IncomingType>,
}

impl<IncomingType: DeserializeOwned> ServerStreamingApi<IncomingType> {
  #[must_use]
  pub fn new(headers: HeaderMap, body: Body) -> Self {
    Self {
      headers,
      body,
      decoder: Decoder::default(),
    }
  }

  // Receive messages on the stream. An error indicates either a network or decoding error. None
  // indicates the stream is complete.
  pub async fn next(&mut self) -> Result<Option<Vec<IncomingType>>> {
    loop {
      let Some(frame) = self.body.frame().await else {
        return Ok(None);
      };

      let frame = frame.map_err(|e| Error::BodyStream(e.into()))?;
      if frame.is_data() {
        let messages = self.decoder.decode_data(frame.data_ref().unwrap())?;
        if !messages.is_empty() {
          return Ok(Some(messages));
        }
      } else if let Some(trailers) = frame.trailers_ref() {
        let (grpc_status, grpc_message) = trailers.iter().fold((None, None), |acc, (k, v)| {
          if k == GRPC_STATUS {
            (Some(v), acc.1)
          } else if k == GRPC_MESSAGE {
            (acc.0, Some(v))
          } else {
            acc
          }
        });

        if let Some(grpc_status) = grpc_status {
          let code = Code::from_string(grpc_status.to_str().unwrap_or_default());
          if code == Code::Ok {
            return Ok(None);
          }

          return Err(Error::Grpc(Status {
            code,
            message: grpc_message
              .map(|v| crate::status::decode_grpc_message(v.to_str().unwrap_or_default())),
          }));
        }

        return Ok(None);
      }
    }
  }

  // Get the received response headers for the API call.
  #[must_use]
  pub const fn received_headers(&self) -> &HeaderMap {
    &self.headers
  }
}
