// Library root
// -----------
// This crate exposes the library surface behind the `jabbercracky-client`
// binary. `main.rs` only parses arguments and wires these modules together.
//
// Module responsibilities:
// - `config`: client settings (base URL, timeout, token sources, interval).
// - `credentials`: bearer token lookup (environment, then ~/.jabbercracky).
// - `api`: HTTP calls for list, download and submit.
// - `ledger`: the append-only `<id>.submitted` dedup file.
// - `auto_submit`: the periodic, cancellable submit loop.
// - `ui`: stdout rendering and spinners.
// - `logging`: tracing subscriber set-up.
pub mod api;
pub mod auto_submit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod ui;

pub use error::{ClientError, Result};
