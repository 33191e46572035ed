// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Virtualization backend drivers.

pub mod colima;
pub mod docker;

pub use colima::ColimaVirt;
pub use docker::{ContainerInfo, DockerVirt, DriverState};
