use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Mutex;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Bounds shared by generated quantities and prices.
pub const MIN_VALUE: u64 = 1;
pub const MAX_VALUE: u64 = 4;

/// Which side of the market the simulated order is on.
///
/// On the wire a `Buy` is written as `B` and a `Sell` as `S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,  // Bid
    Sell, // Ask
}

impl Side {
    pub fn code(&self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

/// A synthetic order. Generated, written once and dropped inside a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub side: Side,
    pub quantity: u64,
    pub price: u64,
}

impl Order {
    /// Wire form of the order: `<side>,<quantity>,<price>\r\n`.
    pub fn encode(&self) -> String {
        format!("{}\r\n", self)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.side.code(), self.quantity, self.price)
    }
}

/// Pseudorandom order source shared by every tick of a run.
///
/// Concurrent ticks draw from the same generator, so the stream of values a
/// given tick sees depends on how ticks interleave. The mutex is only held for
/// the three draws that make up one order.
pub struct OrderGenerator {
    rng: Mutex<StdRng>,
    range: RangeInclusive<u64>,
}

impl OrderGenerator {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Reproducible generator, for runs that need the same order stream.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            range: MIN_VALUE..=MAX_VALUE,
        }
    }

    pub fn next_order(&self) -> Order {
        // rng state stays valid even if a previous holder panicked
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let side = if rng.random_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };
        Order {
            side,
            quantity: rng.random_range(self.range.clone()),
            price: rng.random_range(self.range.clone()),
        }
    }
}

impl Default for OrderGenerator {
    fn default() -> Self {
        OrderGenerator::from_entropy()
    }
}
