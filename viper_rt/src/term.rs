// Copyright 2026 the Viper Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Terminal key-modifier parameter codec (xterm `CSI 1;<mod>` convention).

/// Modifier keys held during a key event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeyMods {
    /// Shift.
    pub shift: bool,
    /// Alt / Option.
    pub alt: bool,
    /// Control.
    pub ctrl: bool,
    /// Meta / Super.
    pub meta: bool,
}

/// Encodes as `1 + shift + 2*alt + 4*ctrl + 8*meta`.
#[must_use]
pub fn encode_mod(k: KeyMods) -> u8 {
    1 + u8::from(k.shift) + 2 * u8::from(k.alt) + 4 * u8::from(k.ctrl) + 8 * u8::from(k.meta)
}

/// Inverse of [`encode_mod`]. Values below 1 decode as no modifiers.
#[must_use]
pub fn decode_mod(m: u8) -> KeyMods {
    let bits = m.saturating_sub(1);
    KeyMods {
        shift: bits & 1 != 0,
        alt: bits & 2 != 0,
        ctrl: bits & 4 != 0,
        meta: bits & 8 != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_combination_round_trips() {
        for bits in 0_u8..16 {
            let k = KeyMods {
                shift: bits & 1 != 0,
                alt: bits & 2 != 0,
                ctrl: bits & 4 != 0,
                meta: bits & 8 != 0,
            };
            assert_eq!(encode_mod(k), bits + 1);
            assert_eq!(decode_mod(encode_mod(k)), k);
        }
        assert_eq!(decode_mod(0), KeyMods::default());
    }
}
