// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain types and collaborator traits.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Compose model, port grammar, allocator, descriptor contract
//!   and the configuration / shell / OS boundaries the rest of the crate uses

pub mod allocator;
pub mod compose;
pub mod config;
pub mod config_handler;
pub mod error;
pub mod ports;
pub mod service;
pub mod shell;
pub mod shims;
