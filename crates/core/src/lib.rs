//! # vigil-core
//!
//! Shared types for Vigil: the cluster spec each supervised cluster declares,
//! the configuration file that lists those clusters, and the error types used
//! while loading them.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod result;
pub mod spec;

pub use config::{ClusterDeclaration, SupervisorConfig, SupervisorSettings};
pub use error::Error;
pub use result::{Result, ResultExt};
pub use spec::{
    ClusterSpec, DaemonEndpoints, DaemonHealthCheck, DaemonHealthSpec, DaemonKind,
    HealthCheckSpec,
};
