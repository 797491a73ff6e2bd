//! Node-based road graph: junctions as vertices, directed road segments as edges.
//!
//! Every undirected road is stored as two directed edges. A one-way street
//! keeps both directions too; the non-traversable half carries `reversed`
//! and is skipped when enumerating outgoing edges.

pub type NodeId = u32;
pub type EdgeId = u32;
pub type EdgeWeight = u32;

pub const SPECIAL_NODEID: NodeId = u32::MAX;
pub const SPECIAL_EDGEID: EdgeId = u32::MAX;
pub const INVALID_EDGE_WEIGHT: EdgeWeight = u32::MAX;
pub const INVALID_COMPONENTID: u32 = u32::MAX;

/// Functional road class of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RoadClass {
    Unknown = 0,
    Motorway = 1,
    MotorwayLink = 2,
    Trunk = 3,
    TrunkLink = 4,
    Primary = 5,
    PrimaryLink = 6,
    Secondary = 7,
    SecondaryLink = 8,
    Tertiary = 9,
    TertiaryLink = 10,
    Unclassified = 11,
    Residential = 12,
    LivingStreet = 13,
    Service = 14,
    LowPriority = 15,
}

impl RoadClass {
    /// Link roads connecting carriageways of different grades.
    pub fn is_ramp(self) -> bool {
        matches!(
            self,
            RoadClass::MotorwayLink
                | RoadClass::TrunkLink
                | RoadClass::PrimaryLink
                | RoadClass::SecondaryLink
                | RoadClass::TertiaryLink
        )
    }

    /// Roads that should not attract a turn instruction when a
    /// higher-class alternative exists.
    pub fn is_low_priority(self) -> bool {
        matches!(self, RoadClass::Service | RoadClass::LowPriority)
    }
}

impl From<u8> for RoadClass {
    fn from(value: u8) -> Self {
        match value {
            1 => RoadClass::Motorway,
            2 => RoadClass::MotorwayLink,
            3 => RoadClass::Trunk,
            4 => RoadClass::TrunkLink,
            5 => RoadClass::Primary,
            6 => RoadClass::PrimaryLink,
            7 => RoadClass::Secondary,
            8 => RoadClass::SecondaryLink,
            9 => RoadClass::Tertiary,
            10 => RoadClass::TertiaryLink,
            11 => RoadClass::Unclassified,
            12 => RoadClass::Residential,
            13 => RoadClass::LivingStreet,
            14 => RoadClass::Service,
            15 => RoadClass::LowPriority,
            _ => RoadClass::Unknown,
        }
    }
}

/// Travel mode of a directed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TravelMode {
    Inaccessible = 0,
    Driving = 1,
    Cycling = 2,
    Walking = 3,
    Ferry = 4,
}

impl From<u8> for TravelMode {
    fn from(value: u8) -> Self {
        match value {
            1 => TravelMode::Driving,
            2 => TravelMode::Cycling,
            3 => TravelMode::Walking,
            4 => TravelMode::Ferry,
            _ => TravelMode::Inaccessible,
        }
    }
}

/// Per-directed-edge attributes.
///
/// `edge_id` starts out as `SPECIAL_EDGEID` and receives a dense forward
/// id during renumbering; it stays `SPECIAL_EDGEID` on reversed halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeData {
    pub distance: EdgeWeight,
    pub name_id: u32,
    pub travel_mode: TravelMode,
    pub reversed: bool,
    pub roundabout: bool,
    pub startpoint: bool,
    pub road_class: RoadClass,
    pub edge_id: EdgeId,
}

impl Default for EdgeData {
    fn default() -> Self {
        Self {
            distance: 0,
            name_id: 0,
            travel_mode: TravelMode::Driving,
            reversed: false,
            roundabout: false,
            startpoint: true,
            road_class: RoadClass::Unknown,
            edge_id: SPECIAL_EDGEID,
        }
    }
}

/// Topology and edge-attribute access needed by the expansion step.
pub trait RoutingGraph {
    fn num_nodes(&self) -> u32;
    fn num_edges(&self) -> u32;
    fn edge_data(&self, edge: EdgeId) -> &EdgeData;
    fn edge_data_mut(&mut self, edge: EdgeId) -> &mut EdgeData;
    fn target(&self, edge: EdgeId) -> NodeId;
    /// First directed edge from `u` to `v`, or `SPECIAL_EDGEID`.
    fn find_edge(&self, u: NodeId, v: NodeId) -> EdgeId;
    /// Dense range of directed edge ids leaving `node`.
    fn adjacent_edges(&self, node: NodeId) -> std::ops::Range<EdgeId>;

    fn out_degree(&self, node: NodeId) -> u32 {
        let range = self.adjacent_edges(node);
        range.end - range.start
    }

    /// Outgoing edges that are actually traversable.
    fn directed_out_degree(&self, node: NodeId) -> u32 {
        self.adjacent_edges(node)
            .filter(|&edge| !self.edge_data(edge).reversed)
            .count() as u32
    }
}

/// An edge handed to the graph builder.
#[derive(Debug, Clone)]
pub struct InputEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub data: EdgeData,
}

/// CSR adjacency over directed edges, sorted by (source, target).
#[derive(Debug, Clone)]
pub struct NodeBasedGraph {
    first_edge: Vec<u32>,
    targets: Vec<NodeId>,
    edge_data: Vec<EdgeData>,
}

impl NodeBasedGraph {
    pub fn from_edges(num_nodes: u32, mut edges: Vec<InputEdge>) -> Self {
        edges.sort_by(|a, b| (a.source, a.target).cmp(&(b.source, b.target)));

        let mut first_edge = vec![0u32; num_nodes as usize + 1];
        let mut targets = Vec::with_capacity(edges.len());
        let mut edge_data = Vec::with_capacity(edges.len());

        let mut cursor = 0usize;
        for node in 0..num_nodes {
            first_edge[node as usize] = cursor as u32;
            while cursor < edges.len() && edges[cursor].source == node {
                targets.push(edges[cursor].target);
                edge_data.push(edges[cursor].data);
                cursor += 1;
            }
        }
        first_edge[num_nodes as usize] = cursor as u32;

        Self {
            first_edge,
            targets,
            edge_data,
        }
    }
}

impl RoutingGraph for NodeBasedGraph {
    fn num_nodes(&self) -> u32 {
        self.first_edge.len() as u32 - 1
    }

    fn num_edges(&self) -> u32 {
        self.targets.len() as u32
    }

    fn edge_data(&self, edge: EdgeId) -> &EdgeData {
        &self.edge_data[edge as usize]
    }

    fn edge_data_mut(&mut self, edge: EdgeId) -> &mut EdgeData {
        &mut self.edge_data[edge as usize]
    }

    fn target(&self, edge: EdgeId) -> NodeId {
        self.targets[edge as usize]
    }

    fn find_edge(&self, u: NodeId, v: NodeId) -> EdgeId {
        self.adjacent_edges(u)
            .find(|&edge| self.targets[edge as usize] == v)
            .unwrap_or(SPECIAL_EDGEID)
    }

    fn adjacent_edges(&self, node: NodeId) -> std::ops::Range<EdgeId> {
        self.first_edge[node as usize]..self.first_edge[node as usize + 1]
    }
}
