// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./health_test.rs"]
mod health_test;

pub mod ready;

use async_trait::async_trait;
use axum::Router;
use http::{Extensions, HeaderMap};
use mw_grpc::error::Result;
use mw_grpc::interceptor::ServerInterceptors;
use mw_grpc::service::ServiceMethod;
use mw_grpc::stream::StreamingSender;
use mw_grpc::{Handler, ServerStreamingHandler, make_server_streaming_router, make_unary_router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SERVICE_NAME: &str = "grpc.health.v1.Health";

//
// CheckRequest
//

// Health check probe. The service field selects a specific service to probe, with the empty
// string standing for the server as a whole.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CheckRequest {
  #[serde(default)]
  pub service: String,
}

//
// ServingStatus
//

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ServingStatus {
  #[default]
  Unknown,
  Serving,
  NotServing,
}

//
// CheckResponse
//

#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CheckResponse {
  pub status: ServingStatus,
}

#[must_use]
pub fn check_method() -> ServiceMethod<CheckRequest, CheckResponse> {
  ServiceMethod::new(SERVICE_NAME, "Check")
}

#[must_use]
pub fn watch_method() -> ServiceMethod<CheckRequest, CheckResponse> {
  ServiceMethod::new(SERVICE_NAME, "Watch")
}

//
// HealthResponder
//

// Responder that reports serving as soon as the server is accepting requests. Watch sends a
// single update and completes, since the reported status never changes over the life of the
// process.
pub struct HealthResponder;

#[async_trait]
impl Handler<CheckRequest, CheckResponse> for HealthResponder {
  async fn handle(
    &self,
    _headers: HeaderMap,
    _context: Extensions,
    _request: CheckRequest,
  ) -> Result<CheckResponse> {
    Ok(CheckResponse {
      status: ServingStatus::Serving,
    })
  }
}

#[async_trait]
impl ServerStreamingHandler<CheckResponse, CheckRequest> for HealthResponder {
  async fn stream(
    &self,
    _request: CheckRequest,
    sender: &mut StreamingSender<CheckResponse>,
  ) -> Result<()> {
    sender
      .send(&CheckResponse {
        status: ServingStatus::Serving,
      })
      .await
  }
}

// Create a router serving both the Check and Watch health methods.
pub fn router(interceptors: &ServerInterceptors) -> Router {
  let responder = Arc::new(HealthResponder);
  make_unary_router(&check_method(), responder.clone(), interceptors.clone()).merge(
    make_server_streaming_router(&watch_method(), responder, interceptors.clone()),
  )
}
