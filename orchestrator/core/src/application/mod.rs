// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod catalog;
pub mod compose_assembly;
pub mod workspace;

pub use catalog::{assign_addresses, build_services, ServiceRegistry};
pub use compose_assembly::ComposeAssembler;
pub use workspace::{RenderedArtifacts, Workspace};
