// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

// Meant to be called from a ctor in every test binary. Note that we intentionally do not install
// an aborting panic hook here as several tests exercise panic recovery inside spawned tasks.
pub fn test_global_init() {
  mw_log::StderrLogger::initialize();
}
