use crate::error::KeygenError;
use crate::PrefixDeriver;
use burrow_core::{Alphabet, Prefix};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use typed_builder::TypedBuilder;

/// Salt baked into every deployment. Changing it changes every prefix.
pub const DEFAULT_SALT: [u8; 16] = [
    0x4a, 0x13, 0x76, 0xd8, 0xe3, 0xae, 0x95, 0x60, 0x89, 0x7d, 0xb5, 0xdb, 0x9c, 0x7f, 0x07, 0x62,
];

/// Scales the leading key byte into `0..=0xc5`, which keeps a 6-byte key
/// below `62^8` so the rendered prefix is always eight full symbols.
pub const DEFAULT_FIRST_BYTE_SCALE: f64 = 198.0 / 256.0;

const MAX_KEY_LEN: usize = 8;

/// Parameters of the PBKDF2-HMAC-SHA1 prefix derivation.
///
/// SHA-1 is kept for compatibility with ids already handed out; the prefix is
/// not a security boundary.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DeriverSettings {
    #[builder(default = DEFAULT_SALT.to_vec())]
    pub salt: Vec<u8>,
    #[builder(default = 8)]
    pub iterations: u32,
    /// Number of derived key bytes, at most 8.
    #[builder(default = 6)]
    pub key_len: usize,
    /// Number of base62 symbols in a rendered prefix.
    #[builder(default = 8)]
    pub prefix_width: usize,
    /// Multiplier applied to the first key byte before rendering.
    ///
    /// Lower values shrink the prefix space, which packs more URLs into each
    /// collision bucket.
    #[builder(default = DEFAULT_FIRST_BYTE_SCALE)]
    pub first_byte_scale: f64,
    /// Alphabet used for prefixes and, through the allocators, for suffixes.
    #[builder(default)]
    pub alphabet: Alphabet,
}

impl Default for DeriverSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DeriverSettings {
    pub fn validate(&self) -> Result<(), KeygenError> {
        if self.key_len == 0 || self.key_len > MAX_KEY_LEN {
            return Err(KeygenError::InvalidKeyLength {
                key_len: self.key_len,
                max: MAX_KEY_LEN,
            });
        }

        if self.prefix_width == 0 {
            return Err(KeygenError::InvalidPrefixWidth);
        }

        if !(self.first_byte_scale > 0.0 && self.first_byte_scale <= 1.0) {
            return Err(KeygenError::InvalidScale(self.first_byte_scale));
        }

        if self.iterations == 0 {
            return Err(KeygenError::InvalidIterations);
        }

        Ok(())
    }
}

/// Derives URL prefixes with PBKDF2-HMAC-SHA1.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    settings: DeriverSettings,
}

impl KeyDeriver {
    pub fn new(settings: DeriverSettings) -> Result<Self, KeygenError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &DeriverSettings {
        &self.settings
    }

    /// Returns the raw key bytes with the first byte already rescaled.
    pub fn derive_key(&self, url: &[u8]) -> Vec<u8> {
        let mut key = vec![0u8; self.settings.key_len];
        pbkdf2_hmac::<Sha1>(url, &self.settings.salt, self.settings.iterations, &mut key);
        key[0] = (f64::from(key[0]) * self.settings.first_byte_scale) as u8;
        key
    }
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self {
            settings: DeriverSettings::default(),
        }
    }
}

impl PrefixDeriver for KeyDeriver {
    fn derive(&self, url: &str) -> Prefix {
        let value = self
            .derive_key(url.as_bytes())
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));

        Prefix::new(
            self.settings
                .alphabet
                .encode_fixed(value, self.settings.prefix_width),
        )
    }

    fn alphabet(&self) -> Alphabet {
        self.settings.alphabet
    }
}
