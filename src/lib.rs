// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async client for the Xen Orchestra API.
//!
//! One [`XoClient`] holds a signed-in JSON-RPC WebSocket session and a REST
//! client sharing its credentials. Long-running operations are driven to
//! completion by the task engine in [`tasks`].

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod lookup;
pub mod resources;
pub mod rest;
pub mod rpc;
pub mod runtime;
pub mod tasks;
pub mod testkit;

pub use client::{CallOptions, XoClient};
pub use config::{ClientConfig, Credentials, RetryMode};
pub use error::{ErrorKind, Result, XoError};
pub use tasks::{Task, TaskStatus};
