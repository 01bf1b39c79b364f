// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport shell for the Continuity memory service: the loopback HTTP
//! API, the lifecycle-hook adapter, and startup wiring.

pub mod hooks;
pub mod serve;
pub mod server;
pub mod shutdown;
