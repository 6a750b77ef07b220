//! Display-token formats for license keys.
//!
//! Keys are short identifiers meant to be typed by hand. They carry no checksum and are
//! not a secret in the cryptographic sense.

use rand::{Rng, seq::SliceRandom};

use super::license_key::KeyTier;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const FREE_SYMBOLS: &[u8] = b".,!?@#";
const PAID_SYMBOLS: &[u8] = b".,!?@#$";

/// (letters, digits, symbols, symbol alphabet)
fn layout(tier: KeyTier) -> (usize, usize, usize, &'static [u8]) {
    match tier {
        KeyTier::Free => (4, 1, 1, FREE_SYMBOLS),
        KeyTier::Paid => (3, 2, 2, PAID_SYMBOLS),
    }
}

pub fn key_len(tier: KeyTier) -> usize {
    let (letters, digits, symbols, _) = layout(tier);
    letters + digits + symbols
}

/// Generates a key for `tier`: characters drawn with replacement, then shuffled.
pub fn generate_key<R: Rng>(tier: KeyTier, rng: &mut R) -> String {
    let (letters, digits, symbols, symbol_set) = layout(tier);
    let mut chars: Vec<u8> = Vec::with_capacity(letters + digits + symbols);
    draw(&mut chars, LETTERS, letters, rng);
    draw(&mut chars, DIGITS, digits, rng);
    draw(&mut chars, symbol_set, symbols, rng);
    chars.shuffle(rng);
    chars.into_iter().map(char::from).collect()
}

fn draw<R: Rng>(out: &mut Vec<u8>, alphabet: &[u8], count: usize, rng: &mut R) {
    for _ in 0..count {
        out.push(alphabet[rng.gen_range(0..alphabet.len())]);
    }
}

/// Whether `key` has the shape produced by [`generate_key`] for `tier`.
pub fn matches_format(key: &str, tier: KeyTier) -> bool {
    let (letters, digits, symbols, symbol_set) = layout(tier);
    if key.len() != letters + digits + symbols {
        return false;
    }
    let bytes = key.as_bytes();
    let count = |set: &[u8]| bytes.iter().filter(|b| set.contains(b)).count();
    count(LETTERS) == letters && count(DIGITS) == digits && count(symbol_set) == symbols
}
