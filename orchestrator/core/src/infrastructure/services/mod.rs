// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service descriptor implementations.

pub mod aws;
pub mod base;
pub mod dns;
pub mod exec;
pub mod git;
pub mod registry;
pub mod talos;

pub use aws::AwsService;
pub use base::{BaseService, ServiceDeps};
pub use dns::DnsService;
pub use exec::ExecService;
pub use git::GitLivereloadService;
pub use registry::RegistryService;
pub use talos::{NodeGroup, TalosService};
