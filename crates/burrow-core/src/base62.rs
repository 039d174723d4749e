//! Base62 rendering of integers and byte strings.
//!
//! Two alphabets are available. [`Alphabet::Shuffled`] is a fixed permutation
//! that hides sequential patterns from casual inspection; it adds no secrecy.
//! [`Alphabet::Ordered`] follows ASCII order, so fixed-width encodings compare
//! bytewise in the same order as the integers they encode.
//!
//! Text produced with one alphabet must be decoded with the same alphabet.

use crate::error::CoreError;

const SHUFFLED: &[u8; 62] = b"ZWmGS8xCEYvtOu6MQI1K93gFbVcJreaq4RhBXlHUo2jDTnw0skPApfid7yzN5L";
const ORDERED: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u64 = 62;

/// 62^11 > u64::MAX, so eleven symbols hold any u64.
const MAX_SYMBOLS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alphabet {
    #[default]
    Shuffled,
    Ordered,
}

impl Alphabet {
    /// Returns the 62 symbols of the alphabet, indexed by digit value.
    pub fn symbols(self) -> &'static [u8; 62] {
        match self {
            Alphabet::Shuffled => SHUFFLED,
            Alphabet::Ordered => ORDERED,
        }
    }

    /// The symbol for digit zero, used for left padding.
    pub fn zero(self) -> char {
        self.symbols()[0] as char
    }

    /// Maps every byte independently to `symbols[byte % 62]`.
    ///
    /// The output has exactly one symbol per input byte. This is a lossy
    /// rendering: bytes that differ by a multiple of 62 share a symbol.
    pub fn encode_bytes(self, bytes: &[u8]) -> String {
        let symbols = self.symbols();
        bytes
            .iter()
            .map(|byte| symbols[(*byte as u64 % BASE) as usize] as char)
            .collect()
    }

    /// Encodes `value` with the minimal number of symbols.
    ///
    /// Zero encodes to a single zero symbol, never to an empty string.
    pub fn encode(self, value: u64) -> String {
        let symbols = self.symbols();
        let mut buf = [0u8; MAX_SYMBOLS];
        let mut start = buf.len();
        let mut remaining = value;

        loop {
            start -= 1;
            buf[start] = symbols[(remaining % BASE) as usize];
            remaining /= BASE;
            if remaining == 0 {
                break;
            }
        }

        buf[start..].iter().map(|byte| *byte as char).collect()
    }

    /// Encodes `value` into exactly `width` symbols.
    ///
    /// Shorter encodings are left-padded with the zero symbol. Longer ones keep
    /// only the `width` least-significant symbols, so the result no longer
    /// decodes to `value`.
    pub fn encode_fixed(self, value: u64, width: usize) -> String {
        let natural = self.encode(value);

        if natural.len() >= width {
            return natural[natural.len() - width..].to_string();
        }

        let mut padded = String::with_capacity(width);
        padded.extend(std::iter::repeat(self.zero()).take(width - natural.len()));
        padded.push_str(&natural);
        padded
    }

    /// Decodes positional base-62 text back into an integer.
    pub fn decode(self, text: &str) -> Result<u64, CoreError> {
        if text.is_empty() {
            return Err(CoreError::InvalidBase62("empty input".to_string()));
        }

        text.bytes().try_fold(0u64, |value, byte| {
            let digit = self.digit_of(byte).ok_or_else(|| {
                CoreError::InvalidBase62(format!(
                    "symbol '{}' is not part of the alphabet: '{}'",
                    byte.escape_ascii(),
                    text
                ))
            })?;

            value
                .checked_mul(BASE)
                .and_then(|value| value.checked_add(digit))
                .ok_or_else(|| CoreError::InvalidBase62(format!("value overflows u64: '{}'", text)))
        })
    }

    fn digit_of(self, symbol: u8) -> Option<u64> {
        self.symbols()
            .iter()
            .position(|candidate| *candidate == symbol)
            .map(|index| index as u64)
    }
}
