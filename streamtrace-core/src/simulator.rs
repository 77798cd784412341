//! Randomized partial I/O
//!
//! Decides how many of the available bytes a hook claims to consume or
//! forward. Without randomization everything is taken. With it, the amount is
//! drawn uniformly from `[0, available]`, so both the "nothing" and "all"
//! boundaries get exercised.
//!
//! The random source is injected so tests can replay a run with a seed.

use crate::message::MessageView;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

/// How far the forward cap rescans the payload
///
/// `Proposed` scans only up to the randomized amount, `Requested` up to the
/// length the host asked for. Both give the same verdict; they differ only in
/// how many blocks are walked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RescanBound {
    #[default]
    Proposed,
    Requested,
}

impl FromStr for RescanBound {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proposed" => Ok(RescanBound::Proposed),
            "requested" => Ok(RescanBound::Requested),
            _ => Err(crate::error::ConfigError::InvalidRescanBound(s.to_string())),
        }
    }
}

impl fmt::Display for RescanBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RescanBound::Proposed => "proposed",
            RescanBound::Requested => "requested",
        })
    }
}

/// Amount returned to the host, and whether the stream must be woken up again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub amount: usize,
    pub reschedule: bool,
}

impl Verdict {
    /// Take `amount` out of `expected` bytes; short counts ask for a reschedule
    pub fn new(amount: usize, expected: usize) -> Self {
        let amount = amount.min(expected);
        Self { amount, reschedule: amount < expected }
    }

    /// Everything was taken
    pub fn full(expected: usize) -> Self {
        Self { amount: expected, reschedule: false }
    }

    /// Force a reschedule when `cond` holds
    pub fn reschedule_if(mut self, cond: bool) -> Self {
        self.reschedule |= cond;
        self
    }
}

/// Payload window a structured forward decision is checked against
#[derive(Clone, Copy)]
pub struct PayloadWindow<'a> {
    pub view: &'a dyn MessageView,
    /// Payload offset where forwarding resumes
    pub offset: usize,
    pub bound: RescanBound,
}

impl fmt::Debug for PayloadWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadWindow")
            .field("offset", &self.offset)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}

/// Replace a proposed forward amount that claims more payload than present
///
/// Returns `proposed` when the window holds at least that many payload bytes,
/// `requested` otherwise.
pub fn cap_forward(window: &PayloadWindow<'_>, requested: usize, proposed: usize) -> usize {
    let scan = match window.bound {
        RescanBound::Proposed => proposed,
        RescanBound::Requested => requested,
    };
    let present = window.view.payload_bytes_in(window.offset, scan);
    if proposed > present {
        requested
    } else {
        proposed
    }
}

/// Partial I/O decisions backed by an injectable random source
pub struct PartialIoSimulator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl PartialIoSimulator {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self { rng: Mutex::new(Box::new(rng)) }
    }

    /// Deterministic simulator for tests and replays
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Uniform draw in `[0, available]`
    fn draw(&self, available: usize) -> usize {
        if available == 0 {
            return 0;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(0..=available)
    }

    /// How many of `available` bytes to consume
    pub fn decide_consume(&self, available: usize, randomize: bool) -> Verdict {
        if !randomize {
            return Verdict::full(available);
        }
        Verdict::new(self.draw(available), available)
    }

    /// How many of `requested` bytes to forward
    ///
    /// With a payload window (structured messages), a randomized amount that
    /// exceeds the payload present is replaced by `requested`.
    pub fn decide_forward(
        &self,
        requested: usize,
        randomize: bool,
        window: Option<PayloadWindow<'_>>,
    ) -> Verdict {
        if !randomize || requested == 0 {
            return Verdict::full(requested);
        }
        let proposed = self.draw(requested);
        let amount = match window {
            Some(window) => cap_forward(&window, requested, proposed),
            None => proposed,
        };
        Verdict::new(amount, requested)
    }
}

impl Default for PartialIoSimulator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl fmt::Debug for PartialIoSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialIoSimulator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StructuredMessage;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_no_randomization_takes_everything() {
        let sim = PartialIoSimulator::seeded(1);
        for available in [0, 1, 7, 4096] {
            assert_eq!(sim.decide_consume(available, false), Verdict::full(available));
            assert_eq!(sim.decide_forward(available, false, None), Verdict::full(available));
        }
    }

    #[test]
    fn test_randomized_stays_in_range_and_hits_bounds() {
        let sim = PartialIoSimulator::seeded(42);
        let available = 5;
        let mut seen = [false; 6];
        for _ in 0..2000 {
            let verdict = sim.decide_consume(available, true);
            assert!(verdict.amount <= available);
            assert_eq!(verdict.reschedule, verdict.amount < available);
            seen[verdict.amount] = true;
        }
        assert!(seen[0], "zero never drawn");
        assert!(seen[available], "full amount never drawn");
    }

    #[test]
    fn test_zero_available() {
        let sim = PartialIoSimulator::seeded(3);
        assert_eq!(sim.decide_consume(0, true), Verdict { amount: 0, reschedule: false });
        assert_eq!(sim.decide_forward(0, true, None), Verdict { amount: 0, reschedule: false });
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let a = PartialIoSimulator::seeded(7);
        let b = PartialIoSimulator::seeded(7);
        let left: Vec<_> = (0..50).map(|_| a.decide_consume(1000, true).amount).collect();
        let right: Vec<_> = (0..50).map(|_| b.decide_consume(1000, true).amount).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_cap_falls_back_to_requested() {
        // Only 4 payload bytes from offset 0
        let msg = StructuredMessage::new().data("ab").data("cd").end();
        for bound in [RescanBound::Proposed, RescanBound::Requested] {
            let window = PayloadWindow { view: &msg, offset: 0, bound };
            assert_eq!(cap_forward(&window, 10, 3), 3);
            assert_eq!(cap_forward(&window, 10, 4), 4);
            assert_eq!(cap_forward(&window, 10, 6), 10);
            let shifted = PayloadWindow { view: &msg, offset: 3, bound };
            assert_eq!(cap_forward(&shifted, 10, 2), 10);
        }
    }

    #[test]
    fn test_decide_forward_applies_cap() {
        let msg = StructuredMessage::new().data("abc").end();
        let window = PayloadWindow { view: &msg, offset: 0, bound: RescanBound::Proposed };

        let sim = PartialIoSimulator::seeded(11);
        let mut partial = false;
        let mut fallback = false;
        for _ in 0..500 {
            let verdict = sim.decide_forward(8, true, Some(window));
            // Never more payload claimed than present, unless it is the full request
            assert!(verdict.amount <= 3 || verdict.amount == 8, "amount {}", verdict.amount);
            partial |= verdict.amount <= 3;
            fallback |= verdict.amount == 8;
        }
        assert!(partial && fallback);

        // A generator stuck at zero always proposes nothing
        let sim = PartialIoSimulator::new(StepRng::new(0, 0));
        let verdict = sim.decide_forward(8, true, Some(window));
        assert_eq!(verdict, Verdict { amount: 0, reschedule: true });
    }

    #[test]
    fn test_rescan_bound_parsing() {
        assert_eq!("Proposed".parse::<RescanBound>().unwrap(), RescanBound::Proposed);
        assert_eq!("requested".parse::<RescanBound>().unwrap(), RescanBound::Requested);
        assert!("everything".parse::<RescanBound>().is_err());
        assert_eq!(RescanBound::default().to_string(), "proposed");
    }
}
