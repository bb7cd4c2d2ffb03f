// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine statistics: snapshot types and the `/stats` client.

mod client;
mod snapshot;

pub use client::{StatsClient, StatsError};
pub use snapshot::*;
