// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-wide port allocation and leader election for cluster nodes.
//!
//! One [`PortAllocator`] is constructed per run and handed to every node
//! descriptor. All state sits behind a single mutex that is held only for
//! the read-modify-write of one allocation, never across a fragment build.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::domain::error::StackError;
use crate::domain::ports::MAX_PORT;

/// Port every node API listens on inside its container.
pub const DEFAULT_NODE_API_PORT: u32 = 50000;

#[derive(Debug)]
struct PortAllocationState {
    next_api_port: u32,
    used_host_ports: HashSet<u32>,
    /// role group -> name of the descriptor that claimed leadership
    leaders: HashMap<String, String>,
}

#[derive(Debug)]
pub struct PortAllocator {
    default_api_port: u32,
    state: Mutex<PortAllocationState>,
}

impl PortAllocator {
    pub fn new(default_api_port: u32) -> Self {
        Self {
            default_api_port,
            state: Mutex::new(PortAllocationState {
                next_api_port: default_api_port.saturating_add(1),
                used_host_ports: HashSet::new(),
                leaders: HashMap::new(),
            }),
        }
    }

    pub fn default_api_port(&self) -> u32 {
        self.default_api_port
    }

    /// Leaders, and every node outside local-VM mode, share the fixed port.
    /// Other local nodes get the next counter value.
    pub fn allocate_api_port(&self, is_leader: bool, is_local: bool) -> Result<u32, StackError> {
        if is_leader || !is_local {
            return Ok(self.default_api_port);
        }
        let mut state = self.state.lock();
        let port = state.next_api_port;
        if port > MAX_PORT {
            return Err(StackError::Validation(format!(
                "no node API ports left above {}",
                self.default_api_port
            )));
        }
        state.next_api_port = port + 1;
        Ok(port)
    }

    /// Claim `candidate`, moving upward past ports already handed out.
    pub fn reserve_host_port(&self, candidate: u32) -> Result<u32, StackError> {
        let mut state = self.state.lock();
        let port = (candidate..=MAX_PORT)
            .find(|port| !state.used_host_ports.contains(port))
            .ok_or_else(|| {
                StackError::Validation(format!("no free host port at or above {}", candidate))
            })?;
        state.used_host_ports.insert(port);
        Ok(port)
    }

    /// First caller for a role group becomes its leader; later callers do not.
    pub fn claim_leader(&self, group: &str, name: &str) -> bool {
        let mut state = self.state.lock();
        if state.leaders.contains_key(group) {
            return false;
        }
        state.leaders.insert(group.to_string(), name.to_string());
        true
    }

    pub fn leader_of(&self, group: &str) -> Option<String> {
        self.state.lock().leaders.get(group).cloned()
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_API_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_leader_and_remote_nodes_use_default_port() {
        let allocator = PortAllocator::new(50000);
        assert_eq!(allocator.allocate_api_port(true, true).unwrap(), 50000);
        assert_eq!(allocator.allocate_api_port(false, false).unwrap(), 50000);
        assert_eq!(allocator.allocate_api_port(true, false).unwrap(), 50000);
        // counter untouched by the calls above
        assert_eq!(allocator.allocate_api_port(false, true).unwrap(), 50001);
    }

    #[test]
    fn test_local_followers_get_sequential_ports() {
        let allocator = PortAllocator::new(50000);
        let ports: Vec<u32> = (0..4).map(|_| allocator.allocate_api_port(false, true).unwrap()).collect();
        assert_eq!(ports, vec![50001, 50002, 50003, 50004]);
    }

    #[test]
    fn test_reserve_host_port_skips_claimed() {
        let allocator = PortAllocator::default();
        assert_eq!(allocator.reserve_host_port(8080).unwrap(), 8080);
        assert_eq!(allocator.reserve_host_port(8080).unwrap(), 8081);
        assert_eq!(allocator.reserve_host_port(8081).unwrap(), 8082);
        assert_eq!(allocator.reserve_host_port(9000).unwrap(), 9000);
    }

    #[test]
    fn test_reserve_host_port_stops_at_highest_port() {
        let allocator = PortAllocator::default();
        assert_eq!(allocator.reserve_host_port(65534).unwrap(), 65534);
        assert_eq!(allocator.reserve_host_port(65534).unwrap(), 65535);
        assert!(allocator.reserve_host_port(65535).unwrap_err().is_validation());
        assert!(allocator.reserve_host_port(u32::MAX).unwrap_err().is_validation());
    }

    #[test]
    fn test_api_ports_run_out_at_highest_port() {
        let allocator = PortAllocator::new(65534);
        assert_eq!(allocator.allocate_api_port(false, true).unwrap(), 65535);
        assert!(allocator.allocate_api_port(false, true).unwrap_err().is_validation());
        assert_eq!(allocator.allocate_api_port(true, true).unwrap(), 65534);
    }

    #[test]
    fn test_first_claim_wins_per_group() {
        let allocator = PortAllocator::default();
        assert!(allocator.claim_leader("controlplanes", "controlplane-1"));
        assert!(!allocator.claim_leader("controlplanes", "controlplane-2"));
        assert!(allocator.claim_leader("other", "x"));
        assert_eq!(allocator.leader_of("controlplanes").as_deref(), Some("controlplane-1"));
    }

    #[test]
    fn test_concurrent_reservations_are_distinct() {
        let allocator = Arc::new(PortAllocator::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || {
                    (0..50).map(|_| allocator.reserve_host_port(30000).unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort_unstable();
        let expected: Vec<u32> = (30000..30400).collect();
        assert_eq!(all, expected);
    }
}
