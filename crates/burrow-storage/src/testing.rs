use burrow_core::{Alphabet, Prefix};
use burrow_keygen::PrefixDeriver;

/// Sends every URL into the same bucket.
pub(crate) struct FixedPrefix(pub Prefix);

impl FixedPrefix {
    pub(crate) fn new(prefix: &str) -> Self {
        Self(Prefix::new(prefix))
    }
}

impl PrefixDeriver for FixedPrefix {
    fn derive(&self, _url: &str) -> Prefix {
        self.0.clone()
    }

    fn alphabet(&self) -> Alphabet {
        Alphabet::Ordered
    }
}
