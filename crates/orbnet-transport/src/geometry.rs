//! Satellite coordinates and radio propagation delay

use serde::{Deserialize, Serialize};

use crate::topology::{ConstellationShape, SlotPosition};

/// Mean equatorial radius of the Earth
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Speed of light in vacuum
pub const SPEED_OF_LIGHT_KM_PER_S: f64 = 299_792.458;

/// Geographic position of a satellite
///
/// Out-of-range latitude or longitude collapses to 0, negative altitude to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
    altitude_km: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64, altitude_km: f64) -> Self {
        let mut coordinate = Self::default();
        coordinate.set_latitude(latitude);
        coordinate.set_longitude(longitude);
        coordinate.set_altitude_km(altitude_km);
        coordinate
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude_km(&self) -> f64 {
        self.altitude_km
    }

    pub fn set_latitude(&mut self, latitude: f64) {
        self.latitude = if (-90.0..=90.0).contains(&latitude) {
            latitude
        } else {
            0.0
        };
    }

    pub fn set_longitude(&mut self, longitude: f64) {
        self.longitude = if (-180.0..=180.0).contains(&longitude) {
            longitude
        } else {
            0.0
        };
    }

    pub fn set_altitude_km(&mut self, altitude_km: f64) {
        self.altitude_km = altitude_km.max(0.0);
    }

    /// Great-circle distance at the altitude of `self`
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = other.longitude.to_radians() - self.longitude.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        (EARTH_RADIUS_KM + self.altitude_km) * c
    }
}

/// Radio propagation delay between two positions, in milliseconds
pub fn propagation_delay_ms(from: &Coordinate, to: &Coordinate) -> f64 {
    from.distance_km(to) / SPEED_OF_LIGHT_KM_PER_S * 1000.0
}

/// Position of a satellite at simulation start
///
/// Orbits are spread over 180 degrees of longitude and satellites evenly
/// around each orbit. Satellites past the pole are folded onto the opposite
/// hemisphere.
pub fn initial_coordinate(shape: &ConstellationShape, altitude_km: f64, position: SlotPosition) -> Coordinate {
    let angle_between_orbits = 180.0 / shape.orbits as f64;
    let angle_between_sats = 360.0 / shape.sats_per_orbit as f64;

    let mut latitude = position.slot as f64 * angle_between_sats;
    let mut longitude = position.orbit as f64 * angle_between_orbits;

    if latitude > 270.0 {
        latitude -= 360.0;
    } else if latitude > 90.0 {
        latitude = 180.0 - latitude;
        longitude -= 180.0;
    }

    Coordinate::new(latitude, longitude, altitude_km)
}
