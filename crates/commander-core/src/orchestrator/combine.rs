use crate::types::{Action, StateVector};

/// Derive the next state from a measurement and the action taken on it.
///
/// Each component becomes `(measurement[i] + payload_len) mod 2`. Downstream
/// ledgers depend on this exact arithmetic.
pub fn combine(measurement: &StateVector, action: &Action) -> StateVector {
    let shift = action.payload_len() as u64;
    measurement
        .iter()
        .map(|&component| ((component as u64 + shift) % 2) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use proptest::prelude::*;

    fn action_with_len(len: usize) -> Action {
        let action = Action::new("ADJUST", Priority::High);
        if len == 0 {
            action
        } else {
            action.with_payload("x".repeat(len))
        }
    }

    #[test]
    fn even_payload_keeps_bits() {
        let m = StateVector::new(vec![0, 1]);
        let action = Action::new("ADJUST", Priority::High).with_payload("ADJUST");
        assert_eq!(combine(&m, &action), StateVector::new(vec![0, 1]));
    }

    #[test]
    fn odd_payload_flips_bits() {
        let m = StateVector::new(vec![0, 1, 1]);
        assert_eq!(
            combine(&m, &action_with_len(3)),
            StateVector::new(vec![1, 0, 0])
        );
    }

    #[test]
    fn absent_payload_reduces_components_mod_two() {
        let m = StateVector::new(vec![2, 3]);
        assert_eq!(combine(&m, &action_with_len(0)), StateVector::new(vec![0, 1]));
    }

    #[test]
    fn multibyte_payload_counts_characters() {
        let m = StateVector::new(vec![0]);
        let action = Action::new("ADJUST", Priority::Low).with_payload("é");
        assert_eq!(combine(&m, &action), StateVector::new(vec![1]));
    }

    proptest! {
        #[test]
        fn component_is_sum_mod_two(
            components in proptest::collection::vec(any::<u8>(), 0..16),
            len in 0usize..64,
        ) {
            let m = StateVector::new(components.clone());
            let out = combine(&m, &action_with_len(len));
            prop_assert_eq!(out.len(), components.len());
            for (i, &c) in components.iter().enumerate() {
                prop_assert_eq!(out.as_slice()[i] as usize, (c as usize + len) % 2);
            }
        }
    }
}
