// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Compose assembly, port allocation and virtualization drivers for
//! stackyard local environments.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, collaborators, descriptors and backend drivers

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
