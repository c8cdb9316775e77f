//! Property tests for the index and fixed-point helpers

use proptest::prelude::*;

use crate::constants::{fees, precision::DECIMAL_PRECISION};
use crate::errors::{XusdError, XusdResult};
use crate::math::{compute_nominal_cr, dec_pow};
use crate::sorted_positions::{NominalRatioSource, SortedPositions};
use crate::types::Address;
use crate::BTreeMap;

struct Keys(BTreeMap<Address, u128>);

impl NominalRatioSource for Keys {
    fn nominal_icr(&self, id: &Address) -> XusdResult<u128> {
        self.0.get(id).copied().ok_or(XusdError::NotInIndex { id: *id })
    }
}

fn id(n: usize) -> Address {
    let mut out = [0u8; 32];
    out[..8].copy_from_slice(&(n as u64).to_be_bytes());
    out
}

proptest! {
    #[test]
    fn prop_index_stays_sorted(
        entries in prop::collection::vec((1u64..1_000_000, 1u64..1_000_000), 1..40),
        hint_seed in any::<u64>(),
        removals in prop::collection::vec(any::<usize>(), 0..10),
    ) {
        let mut keys = Keys(BTreeMap::new());
        let mut list = SortedPositions::default();

        for (i, (coll, debt)) in entries.iter().enumerate() {
            let nicr = compute_nominal_cr(*coll, *debt).unwrap();
            keys.0.insert(id(i), nicr);
            // Arbitrary, mostly wrong, hints
            let prev = (i > 0).then(|| id((hint_seed as usize).wrapping_add(i) % i));
            let next = (i > 1).then(|| id((hint_seed as usize / 3 + i) % i));
            list.insert(id(i), nicr, prev, next, &keys).unwrap();
        }

        for r in removals {
            let victim = id(r % entries.len());
            if list.contains(&victim) {
                list.remove(&victim).unwrap();
            }
        }

        let ordered = list.to_vec();
        prop_assert_eq!(ordered.len() as u64, list.size());
        for pair in ordered.windows(2) {
            prop_assert!(keys.0[&pair[0]] >= keys.0[&pair[1]]);
        }
        let mut reversed: Vec<_> = list.iter_rev().collect();
        reversed.reverse();
        prop_assert_eq!(reversed, ordered);
    }

    #[test]
    fn prop_decay_is_monotonic(a in 0u64..20_000, b in 0u64..20_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let slow = dec_pow(fees::MINUTE_DECAY_FACTOR, lo).unwrap();
        let fast = dec_pow(fees::MINUTE_DECAY_FACTOR, hi).unwrap();
        prop_assert!(fast <= slow);
        prop_assert!(slow <= DECIMAL_PRECISION);
    }
}
