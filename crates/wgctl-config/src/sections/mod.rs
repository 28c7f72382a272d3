// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod daemon;
mod logging;
mod pool;
mod registry;
mod status;
mod tunnel;

pub use daemon::{DaemonConfig, DaemonConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use pool::{PoolConfig, PoolConfigLayer, DEFAULT_POOL_NETWORK};
pub use registry::{RegistryConfig, RegistryConfigLayer, DEFAULT_KEYS_PATH, DEFAULT_REGISTRY_PATH};
pub use status::{StatusConfig, StatusConfigLayer};
pub use tunnel::{TunnelConfig, TunnelConfigLayer};
