// Copyright 2024-2026 Actorhost Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

//! The inbound and outbound message paths, and the ambient message context
//! shared between them (§4.3, §4.5, §5).

pub mod context;
pub mod inbound;
pub mod outbound;
