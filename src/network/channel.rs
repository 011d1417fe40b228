// src/network/channel.rs

//! Point-to-point links: a lossy optical channel for photons and a
//! fixed-delay classical channel for herald messages.

use crate::core::{NodeId, SimError, SimTime, LIGHT_SPEED_FIBER_M_PER_PS};
use crate::simulation::timeline::{EventId, EventKind, Timeline};
use rand::Rng;

/// Result of sending something through a lossy channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Transmission<T> {
    /// Arrived at the far end.
    Delivered(T),
    /// Absorbed or scattered on the way.
    Lost,
}

impl<T> Transmission<T> {
    /// `true` for [`Transmission::Delivered`].
    pub fn is_delivered(&self) -> bool {
        matches!(self, Transmission::Delivered(_))
    }
}

/// A one-way optical fibre from `src` to `dst`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumChannel {
    src: NodeId,
    dst: NodeId,
    distance_m: f64,
    attenuation_db_per_m: f64,
}

impl QuantumChannel {
    /// Creates a channel of `distance_m` meters losing `attenuation_db_per_m` dB per meter.
    pub fn new(src: NodeId, dst: NodeId, distance_m: f64, attenuation_db_per_m: f64) -> Self {
        Self { src, dst, distance_m, attenuation_db_per_m }
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    /// 10^(-attenuation * distance / 10)
    pub fn transmission_probability(&self) -> f64 {
        let loss_db = self.attenuation_db_per_m * self.distance_m;
        10f64.powf(-loss_db / 10.0).clamp(0.0, 1.0)
    }

    /// Time a photon needs to cross the fibre.
    pub fn delay(&self) -> SimTime {
        (self.distance_m / LIGHT_SPEED_FIBER_M_PER_PS).round() as SimTime
    }

    /// Draws one Bernoulli sample deciding whether `photon` survives the trip.
    pub fn transmit<T, R: Rng + ?Sized>(&self, photon: T, rng: &mut R) -> Transmission<T> {
        if rng.gen_bool(self.transmission_probability()) {
            Transmission::Delivered(photon)
        } else {
            Transmission::Lost
        }
    }
}

/// A one-way, loss-free signalling link with a fixed propagation delay.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicalChannel {
    src: NodeId,
    dst: NodeId,
    distance_m: f64,
    delay: SimTime,
}

impl ClassicalChannel {
    /// Creates a link delivering after exactly `delay` picoseconds.
    pub fn new(src: NodeId, dst: NodeId, distance_m: f64, delay: SimTime) -> Self {
        Self { src, dst, distance_m, delay }
    }

    pub fn src(&self) -> NodeId {
        self.src
    }

    pub fn dst(&self) -> NodeId {
        self.dst
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn delay(&self) -> SimTime {
        self.delay
    }

    /// Schedules delivery of `message` to the far end at `at_time + delay`.
    ///
    /// Messages sent on one channel arrive in the order they were sent;
    /// nothing is promised across different channels.
    pub fn send<P: EventKind>(&self, timeline: &mut Timeline<P>, message: P, at_time: SimTime) -> Result<EventId, SimError> {
        timeline.schedule(at_time.saturating_add(self.delay), self.dst, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_transmission_probability() {
        // 1 km at 0.0002 dB/m -> 0.2 dB -> 10^-0.02
        let channel = QuantumChannel::new(NodeId(0), NodeId(1), 1_000.0, 0.0002);
        let expected = 10f64.powf(-0.02);
        assert!((channel.transmission_probability() - expected).abs() < 1e-12);

        let ideal = QuantumChannel::new(NodeId(0), NodeId(1), 0.0, 0.0002);
        assert_eq!(ideal.transmission_probability(), 1.0);
    }

    #[test]
    fn test_transmission_decreases_with_distance() {
        let near = QuantumChannel::new(NodeId(0), NodeId(1), 1_000.0, 0.0002);
        let far = QuantumChannel::new(NodeId(0), NodeId(1), 50_000.0, 0.0002);
        assert!(far.transmission_probability() < near.transmission_probability());
        assert!((far.transmission_probability() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_propagation_delay() {
        let channel = QuantumChannel::new(NodeId(0), NodeId(1), 1_000.0, 0.0);
        assert_eq!(channel.delay(), 5_000_000);
    }

    #[test]
    fn test_transmit_extremes() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let lossless = QuantumChannel::new(NodeId(0), NodeId(1), 0.0, 0.0);
        let opaque = QuantumChannel::new(NodeId(0), NodeId(1), 1_000_000.0, 1.0);
        for _ in 0..500 {
            assert!(lossless.transmit((), &mut rng).is_delivered());
            assert_eq!(opaque.transmit((), &mut rng), Transmission::Lost);
        }
    }

    #[test]
    fn test_classical_send_is_fifo() -> Result<(), SimError> {
        let channel = ClassicalChannel::new(NodeId(0), NodeId(1), 10.0, 100);
        let mut timeline: Timeline<()> = Timeline::new();
        channel.send(&mut timeline, (), 0)?;
        channel.send(&mut timeline, (), 0)?;
        channel.send(&mut timeline, (), 20)?;

        let first = timeline.pop_next().map(|e| (e.time, e.target));
        let second = timeline.pop_next().map(|e| e.time);
        let third = timeline.pop_next().map(|e| e.time);
        assert_eq!(first, Some((100, NodeId(1))));
        assert_eq!(second, Some(100));
        assert_eq!(third, Some(120));
        Ok(())
    }
}
