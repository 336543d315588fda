//! Rolling string hash used for tree fingerprints
//!
//! Seed 5381, then `acc = acc * 33 ^ unit` for every UTF-16 code unit of
//! every fragment fed, in order, with 32-bit wrapping arithmetic. The
//! accumulator is the same whether text arrives in one fragment or many.

use crate::model::Fingerprint;

const SEED: i32 = 5381;

/// Stateful feed hasher
#[derive(Clone, Debug)]
pub struct RollingHasher {
    acc: i32,
}

impl RollingHasher {
    pub fn new() -> Self {
        RollingHasher { acc: SEED }
    }

    /// Append a fragment and return the running accumulator
    pub fn feed(&mut self, fragment: &str) -> i32 {
        for unit in fragment.encode_utf16() {
            self.acc = self.acc.wrapping_mul(33) ^ i32::from(unit);
        }
        self.acc
    }

    pub fn value(&self) -> i32 {
        self.acc
    }

    pub fn finish(&self) -> Fingerprint {
        Fingerprint::from_accumulator(self.acc)
    }
}

impl Default for RollingHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Closure form of the hasher: each call feeds a fragment
pub fn new() -> impl FnMut(&str) -> i32 {
    let mut hasher = RollingHasher::new();
    move |fragment| hasher.feed(fragment)
}
