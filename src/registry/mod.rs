// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! Everything the runtime keeps on hand about interfaces, activations, and
//! observers (§3).

pub mod activation;
pub mod interface;
pub mod observer;
