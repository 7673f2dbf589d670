//! Process-local health cache.
//!
//! Tracks consecutive probe failures per encoded endpoint. Never persisted:
//! a restarted node begins again with every endpoint at zero failures.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use svcreg_common::EncodedEndpoint;

/// Probe history of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub fail_count: u32,
    pub alive: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl NodeStatus {
    pub fn new() -> Self {
        Self {
            fail_count: 0,
            alive: true,
            last_checked: None,
        }
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Encoded endpoint → probe history.
#[derive(Debug, Default)]
pub struct HealthCache {
    nodes: HashMap<EncodedEndpoint, NodeStatus>,
}

impl HealthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful probe, resetting the failure count.
    pub fn record_success(&mut self, endpoint: &EncodedEndpoint) -> &NodeStatus {
        let status = self.entry(endpoint);
        status.fail_count = 0;
        status.alive = true;
        status.last_checked = Some(Utc::now());
        status
    }

    /// Records a failed probe. Once `threshold` consecutive failures are
    /// reached the endpoint is marked dead.
    pub fn record_failure(&mut self, endpoint: &EncodedEndpoint, threshold: u32) -> &NodeStatus {
        let status = self.entry(endpoint);
        status.fail_count = status.fail_count.saturating_add(1);
        if status.fail_count >= threshold {
            status.alive = false;
        }
        status.last_checked = Some(Utc::now());
        status
    }

    pub fn status(&self, endpoint: &EncodedEndpoint) -> Option<&NodeStatus> {
        self.nodes.get(endpoint)
    }

    /// True only for endpoints that have been marked dead. Unseen endpoints
    /// are not dead.
    pub fn is_dead(&self, endpoint: &EncodedEndpoint) -> bool {
        self.nodes.get(endpoint).is_some_and(|status| !status.alive)
    }

    pub fn remove(&mut self, endpoint: &EncodedEndpoint) -> Option<NodeStatus> {
        self.nodes.remove(endpoint)
    }

    /// Keeps only the entries for which `keep` returns true. Returns the
    /// number of entries dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&EncodedEndpoint) -> bool,
    {
        let before = self.nodes.len();
        self.nodes.retain(|endpoint, _| keep(endpoint));
        before - self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copy of every entry, sorted by endpoint.
    pub fn snapshot(&self) -> Vec<(EncodedEndpoint, NodeStatus)> {
        let mut entries: Vec<_> = self
            .nodes
            .iter()
            .map(|(endpoint, status)| (endpoint.clone(), status.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn entry(&mut self, endpoint: &EncodedEndpoint) -> &mut NodeStatus {
        self.nodes.entry(endpoint.clone()).or_default()
    }
}
