//! Constellation topology
//!
//! The [`NetworkTopology`] trait answers "who can this node hear right now".
//! Two implementations are provided:
//!
//! - [`OrbitalTopology`]: a Walker-style grid of orbits that rotates one slot
//!   per position tick, with optional links across the counter-rotating seam
//! - [`StaticTopology`]: an explicit adjacency list for tests and small
//!   hand-built scenarios
//!
//! Neighbor resolution for the orbital grid lives in [`resolve_neighbors`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use orbnet_core::NodeAddress;
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};
use crate::geometry::{Coordinate, initial_coordinate};

/// Index of a node in the flat node array
pub type NodeIndex = usize;

/// Abstraction over network topology
///
/// This trait lets the link layer work with both the rotating constellation
/// and static test topologies.
pub trait NetworkTopology: Send + Sync {
    /// Number of nodes, indexed `0..node_count()`
    fn node_count(&self) -> usize;

    /// Address of a node
    fn address(&self, node: NodeIndex) -> NodeAddress;

    /// Nodes currently within radio range of `node`
    fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex>;

    /// Value that changes whenever the neighbor set of `node` may change
    ///
    /// Link layers cache their neighbor set keyed by this value.
    fn epoch(&self, node: NodeIndex) -> usize;

    /// Current position of a node, used for propagation delay
    fn location(&self, _node: NodeIndex) -> Coordinate {
        Coordinate::default()
    }

    /// Advance the physical positions by one step
    fn position_tick(&mut self) {}
}

/// Fixed grid position of a satellite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotPosition {
    pub orbit: usize,
    pub slot: usize,
}

impl SlotPosition {
    pub fn new(orbit: usize, slot: usize) -> Self {
        Self { orbit, slot }
    }
}

impl fmt::Display for SlotPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}S{}", self.orbit, self.slot)
    }
}

/// Dimensions of the constellation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstellationShape {
    pub orbits: usize,
    pub sats_per_orbit: usize,
    /// Whether links across the seam between the first and last orbit exist
    pub cross_seam: bool,
}

impl ConstellationShape {
    pub fn new(orbits: usize, sats_per_orbit: usize, cross_seam: bool) -> TransportResult<Self> {
        if orbits == 0 || sats_per_orbit == 0 {
            return Err(TransportError::InvalidShape {
                orbits,
                sats_per_orbit,
            });
        }
        Ok(Self {
            orbits,
            sats_per_orbit,
            cross_seam,
        })
    }

    pub fn node_count(&self) -> usize {
        self.orbits * self.sats_per_orbit
    }

    pub fn index_of(&self, position: SlotPosition) -> NodeIndex {
        position.orbit * self.sats_per_orbit + position.slot
    }

    pub fn position_of(&self, node: NodeIndex) -> SlotPosition {
        SlotPosition::new(node / self.sats_per_orbit, node % self.sats_per_orbit)
    }
}

/// Link direction relative to a satellite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
}

/// A resolved neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub direction: Direction,
    pub position: SlotPosition,
}

/// Slot of the cross-seam partner in the adjacent counter-rotating orbit
///
/// Partners drift two slots per position tick because both orbits move in
/// opposite directions.
pub fn seam_slot(sats_per_orbit: usize, fixed_slot: usize, logical_slot: usize) -> usize {
    let s = sats_per_orbit as i64;
    let drift = (logical_slot as i64 - fixed_slot as i64).rem_euclid(s);
    let initial = (s - fixed_slot as i64 - s / 2).rem_euclid(s);
    (initial - (drift * 2) % s).rem_euclid(s) as usize
}

/// Resolve the current neighbors of the satellite at `fixed`
///
/// Up and Down are the in-orbit successor and predecessor of the fixed slot.
/// Left and Right are the same fixed slot in the adjacent orbits; when that
/// crosses the seam the link only exists with `cross_seam`, and targets the
/// partner given by [`seam_slot`]. Self links and duplicates are dropped.
pub fn resolve_neighbors(shape: &ConstellationShape, fixed: SlotPosition, logical_slot: usize) -> Vec<Neighbor> {
    let s = shape.sats_per_orbit;
    let mut resolved: Vec<Neighbor> = Vec::with_capacity(4);

    for direction in Direction::ALL {
        let position = match direction {
            Direction::Up => Some(SlotPosition::new(fixed.orbit, (fixed.slot + 1) % s)),
            Direction::Down => Some(SlotPosition::new(fixed.orbit, (fixed.slot + s - 1) % s)),
            Direction::Right if shape.orbits > 1 => {
                if fixed.orbit + 1 < shape.orbits {
                    Some(SlotPosition::new(fixed.orbit + 1, fixed.slot))
                } else if shape.cross_seam {
                    Some(SlotPosition::new(0, seam_slot(s, fixed.slot, logical_slot)))
                } else {
                    None
                }
            }
            Direction::Left if shape.orbits > 1 => {
                if fixed.orbit > 0 {
                    Some(SlotPosition::new(fixed.orbit - 1, fixed.slot))
                } else if shape.cross_seam {
                    Some(SlotPosition::new(
                        shape.orbits - 1,
                        seam_slot(s, fixed.slot, logical_slot),
                    ))
                } else {
                    None
                }
            }
            Direction::Left | Direction::Right => None,
        };

        if let Some(position) = position {
            if position != fixed && !resolved.iter().any(|n| n.position == position) {
                resolved.push(Neighbor { direction, position });
            }
        }
    }

    resolved
}

/// Rotating constellation grid
///
/// Nodes keep their fixed grid index for the lifetime of the simulation;
/// only their logical slot and physical location move.
#[derive(Debug, Clone)]
pub struct OrbitalTopology {
    shape: ConstellationShape,
    addresses: Vec<NodeAddress>,
    logical_slots: Vec<usize>,
    locations: Vec<Coordinate>,
}

impl OrbitalTopology {
    pub fn new(shape: ConstellationShape, altitude_km: f64) -> Self {
        let count = shape.node_count();
        let mut addresses = Vec::with_capacity(count);
        let mut logical_slots = Vec::with_capacity(count);
        let mut locations = Vec::with_capacity(count);

        for node in 0..count {
            let position = shape.position_of(node);
            addresses.push(NodeAddress::satellite(position.orbit, position.slot));
            logical_slots.push(position.slot);
            locations.push(initial_coordinate(&shape, altitude_km, position));
        }

        Self {
            shape,
            addresses,
            logical_slots,
            locations,
        }
    }

    pub fn shape(&self) -> &ConstellationShape {
        &self.shape
    }

    pub fn position_of(&self, node: NodeIndex) -> SlotPosition {
        self.shape.position_of(node)
    }

    pub fn logical_slot(&self, node: NodeIndex) -> usize {
        self.logical_slots[node]
    }

    /// Resolved neighbors with their link direction
    pub fn resolve(&self, node: NodeIndex) -> Vec<Neighbor> {
        resolve_neighbors(&self.shape, self.position_of(node), self.logical_slots[node])
    }
}

impl NetworkTopology for OrbitalTopology {
    fn node_count(&self) -> usize {
        self.addresses.len()
    }

    fn address(&self, node: NodeIndex) -> NodeAddress {
        self.addresses[node].clone()
    }

    fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.resolve(node)
            .into_iter()
            .map(|n| self.shape.index_of(n.position))
            .collect()
    }

    fn epoch(&self, node: NodeIndex) -> usize {
        self.logical_slots[node]
    }

    fn location(&self, node: NodeIndex) -> Coordinate {
        self.locations[node]
    }

    /// Every satellite takes the location and logical slot of its in-orbit successor
    fn position_tick(&mut self) {
        let s = self.shape.sats_per_orbit;
        for orbit in 0..self.shape.orbits {
            let range = orbit * s..(orbit + 1) * s;
            self.logical_slots[range.clone()].rotate_left(1);
            self.locations[range].rotate_left(1);
        }
    }
}

/// Explicit adjacency list
///
/// Links are bidirectional. Every change bumps a global version so cached
/// neighbor sets are refreshed.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    addresses: Vec<NodeAddress>,
    links: BTreeMap<NodeIndex, BTreeSet<NodeIndex>>,
    version: usize,
}

impl StaticTopology {
    pub fn new(addresses: Vec<NodeAddress>) -> Self {
        Self {
            addresses,
            links: BTreeMap::new(),
            version: 0,
        }
    }

    /// A chain `0 - 1 - ... - n-1`
    pub fn line(addresses: Vec<NodeAddress>) -> Self {
        let mut topology = Self::new(addresses);
        for i in 1..topology.addresses.len() {
            topology.connect(i - 1, i);
        }
        topology
    }

    pub fn connect(&mut self, a: NodeIndex, b: NodeIndex) {
        if a == b {
            return;
        }
        self.links.entry(a).or_default().insert(b);
        self.links.entry(b).or_default().insert(a);
        self.version += 1;
    }

    pub fn disconnect(&mut self, a: NodeIndex, b: NodeIndex) {
        if let Some(set) = self.links.get_mut(&a) {
            set.remove(&b);
        }
        if let Some(set) = self.links.get_mut(&b) {
            set.remove(&a);
        }
        self.version += 1;
    }

    pub fn are_connected(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.links.get(&a).is_some_and(|set| set.contains(&b))
    }
}

impl NetworkTopology for StaticTopology {
    fn node_count(&self) -> usize {
        self.addresses.len()
    }

    fn address(&self, node: NodeIndex) -> NodeAddress {
        self.addresses[node].clone()
    }

    fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.links
            .get(&node)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn epoch(&self, _node: NodeIndex) -> usize {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_shape(orbits: usize, sats: usize, cross_seam: bool) -> ConstellationShape {
        ConstellationShape::new(orbits, sats, cross_seam).unwrap()
    }

    fn positions(neighbors: &[Neighbor]) -> Vec<(usize, usize)> {
        neighbors.iter().map(|n| (n.position.orbit, n.position.slot)).collect()
    }

    #[test]
    fn test_shape_rejects_empty() {
        assert!(ConstellationShape::new(0, 5, false).is_err());
        assert!(ConstellationShape::new(3, 0, false).is_err());
    }

    #[test]
    fn test_index_roundtrip() {
        let shape = make_shape(3, 4, false);
        assert_eq!(shape.node_count(), 12);
        assert_eq!(shape.index_of(SlotPosition::new(2, 1)), 9);
        assert_eq!(shape.position_of(9), SlotPosition::new(2, 1));
    }

    #[test]
    fn test_interior_node_has_four_neighbors() {
        let shape = make_shape(3, 6, false);
        let n = resolve_neighbors(&shape, SlotPosition::new(1, 2), 2);
        assert_eq!(positions(&n), vec![(1, 3), (1, 1), (0, 2), (2, 2)]);
    }

    #[test]
    fn test_in_orbit_wraparound() {
        let shape = make_shape(3, 6, false);
        let n = resolve_neighbors(&shape, SlotPosition::new(1, 5), 5);
        assert_eq!(n[0].position, SlotPosition::new(1, 0));
        assert_eq!(n[1].position, SlotPosition::new(1, 4));
    }

    #[test]
    fn test_no_seam_links_without_cross_seam() {
        let shape = make_shape(3, 6, false);
        let n = resolve_neighbors(&shape, SlotPosition::new(2, 0), 0);
        assert_eq!(positions(&n), vec![(2, 1), (2, 5), (1, 0)]);

        let n = resolve_neighbors(&shape, SlotPosition::new(0, 0), 0);
        assert_eq!(positions(&n), vec![(0, 1), (0, 5), (1, 0)]);
    }

    #[test]
    fn test_seam_slot_formula() {
        // S = 10, fixed slot 7: initial partner is 8
        assert_eq!(seam_slot(10, 7, 7), 8);
        // one tick later the partner moved two slots back
        assert_eq!(seam_slot(10, 7, 8), 6);
        assert_eq!(seam_slot(10, 0, 0), 5);
        // negative intermediate wraps
        assert_eq!(seam_slot(10, 0, 3), 9);
        // logical slot behind fixed slot counts as wrapped drift
        assert_eq!(seam_slot(10, 9, 0), seam_slot(10, 9, 9 + 1));
    }

    #[test]
    fn test_cross_seam_neighbors() {
        let shape = make_shape(3, 10, true);
        let n = resolve_neighbors(&shape, SlotPosition::new(2, 7), 7);
        let right = n.iter().find(|n| n.direction == Direction::Right).unwrap();
        assert_eq!(right.position, SlotPosition::new(0, 8));

        let n = resolve_neighbors(&shape, SlotPosition::new(0, 7), 8);
        let left = n.iter().find(|n| n.direction == Direction::Left).unwrap();
        assert_eq!(left.position, SlotPosition::new(2, 6));
    }

    #[test]
    fn test_single_orbit_has_no_side_links() {
        let shape = make_shape(1, 4, true);
        let n = resolve_neighbors(&shape, SlotPosition::new(0, 0), 0);
        assert_eq!(positions(&n), vec![(0, 1), (0, 3)]);
    }

    #[test]
    fn test_duplicates_and_self_removed() {
        // two satellites per orbit: Up and Down coincide
        let shape = make_shape(2, 2, true);
        let n = resolve_neighbors(&shape, SlotPosition::new(0, 0), 0);
        assert_eq!(n.iter().filter(|n| n.position == SlotPosition::new(0, 1)).count(), 1);

        // one satellite per orbit: Up and Down are self
        let shape = make_shape(2, 1, false);
        let n = resolve_neighbors(&shape, SlotPosition::new(0, 0), 0);
        assert_eq!(positions(&n), vec![(1, 0)]);
    }

    #[test]
    fn test_orbital_position_tick_rotates() {
        let shape = make_shape(2, 4, true);
        let mut topology = OrbitalTopology::new(shape, 780.0);
        let before = topology.location(1);

        topology.position_tick();

        assert_eq!(topology.logical_slot(0), 1);
        assert_eq!(topology.logical_slot(3), 0);
        assert_eq!(topology.location(0), before);
        // fixed addresses never move
        assert_eq!(topology.address(0).as_str(), "R0S0");
        assert_eq!(topology.epoch(0), 1);
    }

    #[test]
    fn test_static_topology_versioning() {
        let addrs = vec!["A".into(), "B".into(), "C".into()];
        let mut topology = StaticTopology::line(addrs);
        assert_eq!(topology.neighbors(1), vec![0, 2]);
        let epoch = topology.epoch(0);

        topology.disconnect(0, 1);
        assert!(!topology.are_connected(0, 1));
        assert_eq!(topology.neighbors(1), vec![2]);
        assert_ne!(topology.epoch(0), epoch);
    }
}
