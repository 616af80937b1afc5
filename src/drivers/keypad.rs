//! Operator keypad — resistor-ladder button bank on one ADC channel.
//!
//! Each button pulls the ladder to a distinct voltage; decoding is an
//! explicit, ordered range-to-key table checked at both ends.  Any reading
//! above the last threshold decodes to [`KeypadKey::None`] — including the
//! 900–1000 dead band that older rig firmware left falling off the end of
//! its threshold ladder.

/// Decoded keypad buttons.  `Right` pauses the session, `Left` unpauses,
/// `Select` starts it; `Up`/`Down` fire the manual puff/tone used while
/// positioning the animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadKey {
    Right,
    Up,
    Down,
    Left,
    Select,
    None,
}

/// Ordered (exclusive upper bound, key) ladder.  A reading below row N's
/// bound and not below row N-1's decodes to row N's key.
const LADDER: [(u16, KeypadKey); 5] = [
    (98, KeypadKey::Right),
    (254, KeypadKey::Up),
    (408, KeypadKey::Down),
    (600, KeypadKey::Left),
    (900, KeypadKey::Select),
];

/// Decode a raw ladder reading into a key.
pub fn decode(raw: u16) -> KeypadKey {
    for (bound, key) in LADDER {
        if raw < bound {
            return key;
        }
    }
    KeypadKey::None
}

/// Edge-detecting keypad reader: reports a key only on its press edge so a
/// held button does not retrigger every tick.
#[derive(Debug, Default)]
pub struct Keypad {
    last: Option<KeypadKey>,
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw ADC reading; returns the key on its press edge.
    pub fn feed(&mut self, raw: u16) -> Option<KeypadKey> {
        let key = decode(raw);
        let edge = match (self.last, key) {
            (_, KeypadKey::None) => None,
            (Some(prev), k) if prev == k => None,
            (_, k) => Some(k),
        };
        self.last = Some(key);
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_boundaries() {
        assert_eq!(decode(0), KeypadKey::Right);
        assert_eq!(decode(97), KeypadKey::Right);
        assert_eq!(decode(98), KeypadKey::Up);
        assert_eq!(decode(253), KeypadKey::Up);
        assert_eq!(decode(254), KeypadKey::Down);
        assert_eq!(decode(407), KeypadKey::Down);
        assert_eq!(decode(408), KeypadKey::Left);
        assert_eq!(decode(599), KeypadKey::Left);
        assert_eq!(decode(600), KeypadKey::Select);
        assert_eq!(decode(899), KeypadKey::Select);
    }

    #[test]
    fn dead_band_and_idle_decode_to_none() {
        // 900–1000 was undefined behaviour in the old ladder; now it is
        // explicitly no key, same as the idle rail.
        assert_eq!(decode(900), KeypadKey::None);
        assert_eq!(decode(950), KeypadKey::None);
        assert_eq!(decode(1000), KeypadKey::None);
        assert_eq!(decode(u16::MAX), KeypadKey::None);
    }

    #[test]
    fn edge_detection_fires_once_per_press() {
        let mut k = Keypad::new();
        assert_eq!(k.feed(1023), None);
        assert_eq!(k.feed(650), Some(KeypadKey::Select));
        assert_eq!(k.feed(650), None, "held key must not retrigger");
        assert_eq!(k.feed(1023), None);
        assert_eq!(k.feed(650), Some(KeypadKey::Select));
    }
}
