// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use std::marker::PhantomData;

//
// ServiceMethod
//

// Describes a gRPC service method and the request/response types exchanged over it. The full path
// follows the wire form of /package.Service/Method.
pub struct ServiceMethod<RequestType, ResponseType> {
  service: String,
  method: String,
  request_type: PhantomData<RequestType>,
  response_type: PhantomData<ResponseType>,
}

impl<RequestType, ResponseType> ServiceMethod<RequestType, ResponseType> {
  // Create a new service method given the fully qualified service name and the method name.
  #[must_use]
  pub fn new(service_name: &str, method_name: &str) -> Self {
    Self {
      service: service_name.to_string(),
      method: method_name.to_string(),
      request_type: PhantomData,
      response_type: PhantomData,
    }
  }

  #[must_use]
  pub fn full_path(&self) -> String {
    format!("/{}/{}", self.service, self.method)
  }
}
