// meshwork - shared gRPC server/client libraries
// Copyright Meshwork, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use std::sync::Once;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

const DEFAULT_FILTER_RULES: &str = "info";

//
// StderrLogger
//

// Process wide stderr logger behind the log facade. Repeated calls to initialize() are no-ops so
// it is safe to call from every test binary entry point.
pub struct StderrLogger;

impl StderrLogger {
  pub fn initialize() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
      // Gate ANSI on whether MW_LOG_ANSI is set. This avoids using this feature by default (e.g.
      // in k8s) but allows it to be enabled for local development should the user want it.
      let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::env::var("MW_LOG_ANSI").is_ok())
        .with_line_number(true)
        .with_thread_ids(true)
        .compact();

      let filter = EnvFilter::new(
        std::env::var("RUST_LOG")
          .as_deref()
          .unwrap_or(DEFAULT_FILTER_RULES),
      );

      Registry::default().with(filter).with(stderr).init();
    });
  }
}
