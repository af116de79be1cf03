//! Named queue payload types.
//!
//! Every event recorded through the pipeline is tagged with a
//! [`NamedQueueKind`], the discriminant of the logical queue it belongs to.
//! The ring buffer itself treats payloads as opaque; only the consumer
//! capability branches on the kind.

use serde::{Deserialize, Serialize};

/// Discriminant tag identifying a logical named queue.
///
/// Open enumeration: new queue kinds may be added without a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NamedQueueKind {
    /// Slow and large RPC operations
    SlowLog,
    /// Accepted balancer decisions with cost details
    BalancerDecision,
    /// Rejected balancer plans and the reason
    BalancerRejection,
    /// Write-ahead-log roll/archival events
    WalEventTracker,
}

impl NamedQueueKind {
    /// Stable lowercase name, used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlowLog => "slow_log",
            Self::BalancerDecision => "balancer_decision",
            Self::BalancerRejection => "balancer_rejection",
            Self::WalEventTracker => "wal_event_tracker",
        }
    }
}

impl std::fmt::Display for NamedQueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slow or oversized operation observed on the request path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowLogRecord {
    pub start_time_ms: u64,
    pub processing_time_ms: u64,
    pub queue_time_ms: u64,
    pub response_size: u64,
    pub client_address: String,
    pub user_name: String,
    pub method_name: String,
    pub region_name: String,
    pub param: String,
}

/// Cost breakdown of an accepted balancer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancerDecisionRecord {
    pub initial_function_costs: String,
    pub final_function_costs: String,
    pub init_total_cost: f64,
    pub computed_total_cost: f64,
    pub computed_steps: u64,
}

/// A balancer plan that was rejected before execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancerRejectionRecord {
    pub reason: String,
    pub cost_func_info: Vec<String>,
}

/// A write-ahead-log lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEventRecord {
    pub wal_name: String,
    pub state: String,
    pub wal_length: u64,
    pub timestamp_ms: u64,
}

/// Event payload carried through the ring buffer, tagged by queue kind.
///
/// Variants map one-to-one onto [`NamedQueueKind`]; the enum is open for the
/// same reason the kind tag is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum NamedQueuePayload {
    SlowLog(SlowLogRecord),
    BalancerDecision(BalancerDecisionRecord),
    BalancerRejection(BalancerRejectionRecord),
    WalEventTracker(WalEventRecord),
}

impl NamedQueuePayload {
    /// The logical queue this payload belongs to
    pub fn kind(&self) -> NamedQueueKind {
        match self {
            Self::SlowLog(_) => NamedQueueKind::SlowLog,
            Self::BalancerDecision(_) => NamedQueueKind::BalancerDecision,
            Self::BalancerRejection(_) => NamedQueueKind::BalancerRejection,
            Self::WalEventTracker(_) => NamedQueueKind::WalEventTracker,
        }
    }

    /// Substring match against the payload's searchable text fields
    pub fn matches(&self, needle: &str) -> bool {
        match self {
            Self::SlowLog(r) => {
                r.client_address.contains(needle)
                    || r.user_name.contains(needle)
                    || r.method_name.contains(needle)
                    || r.region_name.contains(needle)
                    || r.param.contains(needle)
            }
            Self::BalancerDecision(r) => {
                r.initial_function_costs.contains(needle)
                    || r.final_function_costs.contains(needle)
            }
            Self::BalancerRejection(r) => {
                r.reason.contains(needle) || r.cost_func_info.iter().any(|c| c.contains(needle))
            }
            Self::WalEventTracker(r) => r.wal_name.contains(needle) || r.state.contains(needle),
        }
    }
}

/// Query against one named queue; administrative read path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQueueGetRequest {
    /// Which queue to read
    pub kind: NamedQueueKind,
    /// Cap on the number of returned records (newest first); `None` = all
    pub limit: Option<usize>,
    /// Optional substring filter applied to each record's text fields
    pub filter: Option<String>,
}

impl NamedQueueGetRequest {
    pub fn new(kind: NamedQueueKind) -> Self {
        Self {
            kind,
            limit: None,
            filter: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Records returned from one named queue, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQueueGetResponse {
    pub kind: NamedQueueKind,
    pub records: Vec<NamedQueuePayload>,
}
