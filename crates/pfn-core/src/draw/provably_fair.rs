use super::DrawSource;
use core::fmt::Write;
use sha2::{Digest, Sha256};

/// Number of hex characters kept for a derived client seed.
pub const CLIENT_SEED_LEN: usize = 32;

/// Number of random bits carried by each draw.
///
/// 52 bits fit exactly in an `f64` mantissa, so every draw is an exact dyadic
/// rational and `raw × 2^256` is an exact integer.
pub const DRAW_BITS: u32 = 52;

const DRAW_SCALE: f64 = (1_u64 << DRAW_BITS) as f64;

/// SHA-256 backed provably-fair draw source.
///
/// Both seeds are derived from the construction seed, so a given seed string
/// always reproduces the same seed pair and the same draw sequence:
///
/// - `server_seed = hex(sha256("server:" ‖ seed))`
/// - `client_seed = hex(sha256("client:" ‖ seed))[..32]`
/// - `draw(nonce) = top 52 bits of sha256(server ":" client ":" nonce) / 2^52`
///
/// The server seed can be committed to ahead of time by publishing
/// [`ProvablyFairNumbers::server_seed_hash`], and checked later with
/// [`ProvablyFairNumbers::verify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvablyFairNumbers {
    client_seed: String,
    server_seed: String,
    nonce: u64,
}

impl ProvablyFairNumbers {
    /// Creates a source whose seed pair is derived from `seed`, starting at
    /// nonce 0.
    pub fn new(seed: &str) -> Self {
        let server_seed = hex_digest(&[b"server:", seed.as_bytes()]);
        let mut client_seed = hex_digest(&[b"client:", seed.as_bytes()]);
        client_seed.truncate(CLIENT_SEED_LEN);
        Self::with_seeds(server_seed, client_seed)
    }

    /// Creates a source from an explicit seed pair, starting at nonce 0.
    pub fn with_seeds(server_seed: impl Into<String>, client_seed: impl Into<String>) -> Self {
        Self {
            client_seed: client_seed.into(),
            server_seed: server_seed.into(),
            nonce: 0,
        }
    }

    /// Public commitment to the server seed: `hex(sha256(server_seed))`.
    pub fn server_seed_hash(&self) -> String {
        hex_digest(&[self.server_seed.as_bytes()])
    }

    /// Checks a revealed server seed against a previously published
    /// commitment.
    pub fn verify(server_seed: &str, commitment: &str) -> bool {
        hex_digest(&[server_seed.as_bytes()]).eq_ignore_ascii_case(commitment)
    }

    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.server_seed.as_bytes());
        hasher.update(b":");
        hasher.update(self.client_seed.as_bytes());
        hasher.update(b":");
        hasher.update(self.nonce.to_string().as_bytes());
        hasher.finalize().into()
    }
}

impl DrawSource for ProvablyFairNumbers {
    fn random(&self) -> f64 {
        let digest = self.digest();
        let mut word = [0_u8; 8];
        word.copy_from_slice(&digest[..8]);
        #[allow(clippy::cast_precision_loss)]
        let bits = (u64::from_be_bytes(word) >> (64 - DRAW_BITS)) as f64;
        bits / DRAW_SCALE
    }

    fn client_seed(&self) -> &str {
        &self.client_seed
    }

    fn server_seed(&self) -> &str {
        &self.server_seed
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }

    fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

fn hex_digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            // Writing into a `String` cannot fail.
            let _ = write!(out, "{byte:02x}");
            out
        })
}
