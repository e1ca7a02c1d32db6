/*!
# Watchpost DevKit - test support

Utilities for exercising the monitor without external services:
- Stub HTTP server (switchable health endpoint + MessageBird-compatible gateway)
- Temporary config files
- Open / closed localhost ports
*/

pub mod stub_server;
pub mod test_utils;

pub use axum::http::StatusCode;

pub use stub_server::{RecordedMessage, StubServer};
pub use test_utils::{closed_port, config_file, init_test_logging, monitor_yaml, wait_until, OpenPort};
