//! Front-node view consumed by the property resolution path.
//!
//! The fire-front integrator owns its nodes; the data layers only need a
//! read-only view of a node's position, orientation, timing, and a handful of
//! front-shape diagnostics. [`FrontNode`] is that view and [`NodeSnapshot`] is
//! a plain-data implementation used by hosts without their own node type.

use super::vec3::Vec3;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a front node, exported to models as a numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeState {
    #[default]
    Init,
    Moving,
    Splitting,
    Merging,
    Final,
    Link,
}

impl NodeState {
    /// Numeric code written into model buffers.
    #[must_use]
    pub fn code(self) -> f64 {
        match self {
            NodeState::Init => 0.0,
            NodeState::Moving => 1.0,
            NodeState::Splitting => 2.0,
            NodeState::Merging => 3.0,
            NodeState::Final => 4.0,
            NodeState::Link => 5.0,
        }
    }
}

/// Read-only view of a fire-front node.
///
/// Implemented by the host's front representation. Every accessor must be
/// cheap: the broker calls them once per wanted property per query.
pub trait FrontNode {
    /// Current location in projected metres.
    fn location(&self) -> Vec3;

    /// Outward unit normal of the front at this node.
    fn normal(&self) -> Vec3;

    /// Time the node reached its current location.
    fn time(&self) -> f64;

    /// Time the node will next be updated; layers sample at this time.
    fn update_time(&self) -> f64;

    /// Depth of the burning zone behind the node.
    fn front_depth(&self) -> f64;

    /// Local front curvature.
    fn curvature(&self) -> f64;

    fn id(&self) -> i64;

    fn state(&self) -> NodeState;

    /// Lowest arrival time among nodes within `distance` of this one.
    fn lowest_nearby(&self, distance: f64) -> f64;
}

/// Plain-data front node.
///
/// `lowest_nearby` has no front to scan, so it reports the stored
/// `fastest_nearby` value regardless of the requested distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub location: Vec3,
    pub normal: Vec3,
    pub time: f64,
    pub update_time: f64,
    pub front_depth: f64,
    pub curvature: f64,
    pub id: i64,
    pub state: NodeState,
    pub fastest_nearby: f64,
}

impl NodeSnapshot {
    /// Create a node at `location` facing `normal`, with both times set to `time`.
    #[must_use]
    pub fn new(location: Vec3, normal: Vec3, time: f64) -> Self {
        Self {
            location,
            normal,
            time,
            update_time: time,
            front_depth: 0.0,
            curvature: 0.0,
            id: 0,
            state: NodeState::Moving,
            fastest_nearby: time,
        }
    }

    #[must_use]
    pub fn with_update_time(mut self, update_time: f64) -> Self {
        self.update_time = update_time;
        self
    }
}

impl FrontNode for NodeSnapshot {
    fn location(&self) -> Vec3 {
        self.location
    }

    fn normal(&self) -> Vec3 {
        self.normal
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn update_time(&self) -> f64 {
        self.update_time
    }

    fn front_depth(&self) -> f64 {
        self.front_depth
    }

    fn curvature(&self) -> f64 {
        self.curvature
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn state(&self) -> NodeState {
        self.state
    }

    fn lowest_nearby(&self, _distance: f64) -> f64 {
        self.fastest_nearby
    }
}
