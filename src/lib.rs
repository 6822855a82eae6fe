//! A concurrent line-protocol server for digit-product queries.
//!
//! For a query integer N the server answers with the smallest natural
//! number whose decimal digits multiply to N, one newline-terminated
//! exchange per request line, many clients at a time.
//!
//! - [`solver`]: the pure digit-product algorithm
//! - [`protocol`]: wire parsing, response rendering, and the session loop
//! - [`server`]: listener, worker-pool dispatch, and graceful shutdown
//! - [`config`]: CLI and TOML configuration

pub mod config;
pub mod protocol;
pub mod server;
pub mod solver;
