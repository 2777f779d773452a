use serde::{Deserialize, Serialize};

use super::ids::{EntityId, EntityRef};

/// Why a flow trace stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Terminal {
    DepthLimit,
    Leaf,
    CycleBreak,
    Unresolved,
}

impl Terminal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepthLimit => "depth-limit",
            Self::Leaf => "leaf",
            Self::CycleBreak => "cycle-break",
            Self::Unresolved => "unresolved",
        }
    }
}

/// One caller → callee step. Hops where expansion stopped carry a terminal
/// marker; unresolved callees keep the original call text in the External
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hop {
    pub caller: EntityId,
    pub callee: EntityRef,
    pub line: u32,
    /// 1 for hops out of the entry routine.
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub terminal: Option<Terminal>,
    /// Attached when inheritance tie-breaking picked the left-most base.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

/// Depth-first hop sequence for one top-level call site of an entry routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowTrace {
    pub entry: EntityId,
    pub hops: Vec<Hop>,
    /// Deepest hop depth reached.
    pub depth: u32,
    /// Marker of the final hop.
    pub terminal: Terminal,
}

/// All traces rooted at one entry routine, one per top-level call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEntry {
    pub routine_id: EntityId,
    pub traces: Vec<FlowTrace>,
}
