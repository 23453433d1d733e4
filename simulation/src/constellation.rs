//! Satellites and the shared medium they talk over
//!
//! Satellites are stored flat, indexed `orbit * sats_per_orbit + slot`, the
//! same indexing the orbital topology uses. Each one owns its routing layer;
//! all of them share one [`Medium`].

use std::fs;
use std::path::Path;
use std::sync::Arc;

use orbnet_core::{NodeAddress, StatisticsSink, VirtualClock};
use orbnet_routing::{AodvRouter, FloodingRouter, NetworkLayer};
use orbnet_transport::{Medium, NetworkTopology, NodeIndex, OrbitalTopology, SlotPosition};
use tracing::debug;

use crate::config::{LayerKind, SimConfig};
use crate::error::SimResult;

/// One node of the constellation
pub struct Satellite {
    pub address: NodeAddress,
    /// Fixed grid position
    pub position: SlotPosition,
    pub layer: Box<dyn NetworkLayer>,
}

/// Every satellite of a run
pub struct Constellation {
    satellites: Vec<Satellite>,
    medium: Arc<Medium<OrbitalTopology>>,
}

impl Constellation {
    /// Build the grid, the medium, and one routing layer per satellite
    pub fn new(config: &SimConfig, clock: VirtualClock, stats: Arc<dyn StatisticsSink>, seed: u64) -> SimResult<Self> {
        let shape = config.shape()?;
        let topology = OrbitalTopology::new(shape, config.altitude_km);
        let medium = Arc::new(Medium::new(topology, config.link_config(), stats, seed)?);

        let params = config.aodv_parameters();
        let aodv = config.aodv_config();

        let mut satellites = Vec::with_capacity(medium.node_count());
        for node in 0..medium.node_count() {
            let link = medium.link(node)?;
            let address = link.address().clone();
            let layer: Box<dyn NetworkLayer> = match config.network_layer {
                LayerKind::Aodv => Box::new(AodvRouter::new(link, clock.clone(), params, aodv)),
                LayerKind::Flooding => Box::new(FloodingRouter::new(link, clock.clone())),
            };
            satellites.push(Satellite {
                address,
                position: shape.position_of(node),
                layer,
            });
        }

        debug!(
            satellites = satellites.len(),
            layer = ?config.network_layer,
            diameter = params.net_diameter,
            "Constellation built"
        );

        Ok(Self { satellites, medium })
    }

    pub fn len(&self) -> usize {
        self.satellites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.satellites.is_empty()
    }

    pub fn satellite(&self, node: NodeIndex) -> Option<&Satellite> {
        self.satellites.get(node)
    }

    pub fn satellite_mut(&mut self, node: NodeIndex) -> Option<&mut Satellite> {
        self.satellites.get_mut(node)
    }

    pub fn satellites(&self) -> impl Iterator<Item = &Satellite> {
        self.satellites.iter()
    }

    pub fn address(&self, node: NodeIndex) -> Option<&NodeAddress> {
        self.satellites.get(node).map(|sat| &sat.address)
    }

    pub fn medium(&self) -> &Arc<Medium<OrbitalTopology>> {
        &self.medium
    }

    /// Current neighbors of a satellite
    pub fn neighbors(&self, node: NodeIndex) -> Vec<NodeAddress> {
        let topology = self.medium.topology();
        topology
            .neighbors(node)
            .into_iter()
            .map(|neighbor| topology.address(neighbor))
            .collect()
    }

    /// Rotate every orbit by one slot
    pub fn position_tick(&self) {
        self.medium.position_tick();
    }

    /// Write one routing table file per satellite into `dir`
    pub fn export_routing_tables(&self, dir: &Path) -> SimResult<usize> {
        fs::create_dir_all(dir)?;
        for satellite in &self.satellites {
            satellite.layer.export_routing_table(dir)?;
        }
        Ok(self.satellites.len())
    }
}

#[cfg(test)]
mod tests {
    use orbnet_core::NullStatistics;

    use super::*;

    fn make_constellation(orbits: usize, sats: usize, cross_seam: bool, layer: LayerKind) -> Constellation {
        let config = SimConfig {
            orbits,
            sats_per_orbit: sats,
            cross_seam,
            network_layer: layer,
            ..SimConfig::default()
        };
        Constellation::new(&config, VirtualClock::new(), Arc::new(NullStatistics), 1).unwrap()
    }

    #[test]
    fn test_addresses_follow_grid() {
        let constellation = make_constellation(3, 4, false, LayerKind::Aodv);
        assert_eq!(constellation.len(), 12);
        let sat = constellation.satellite(6).unwrap();
        assert_eq!(sat.address, NodeAddress::satellite(1, 2));
        assert_eq!(sat.position, SlotPosition::new(1, 2));
        assert_eq!(sat.layer.local_address(), &sat.address);
    }

    #[test]
    fn test_position_tick_moves_seam_partner() {
        let constellation = make_constellation(3, 4, true, LayerKind::Flooding);
        let before = constellation.neighbors(0);
        assert!(before.contains(&NodeAddress::satellite(1, 0)));
        assert!(before.contains(&NodeAddress::satellite(2, 2)));

        constellation.position_tick();
        let after = constellation.neighbors(0);
        assert!(after.contains(&NodeAddress::satellite(2, 0)));
        assert!(!after.contains(&NodeAddress::satellite(2, 2)));
        // grid links away from the seam stay put
        assert!(after.contains(&NodeAddress::satellite(1, 0)));
        assert!(after.contains(&NodeAddress::satellite(0, 1)));
        assert!(after.contains(&NodeAddress::satellite(0, 3)));
    }

    #[test]
    fn test_export_routing_tables() {
        let constellation = make_constellation(2, 3, false, LayerKind::Aodv);
        let dir = tempfile::tempdir().unwrap();
        let written = constellation.export_routing_tables(&dir.path().join("tables")).unwrap();
        assert_eq!(written, 6);
        assert!(dir.path().join("tables").join("R1S2-routing-table.json").exists());
    }
}
