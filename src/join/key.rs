//! Canonical join-key representation and the shard hash.
//!
//! Equality and hashing both run on [`KeyAtom`]s so that a numeric key compares and hashes the
//! same whether it was read from an integer column, a float column or a coerced string column.

use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::types::Value;

/// Seed of the shard hash. Changing it changes every shard assignment.
pub const SHARD_HASH_SEED: u64 = 0x5348_4152_445F_4B59;

// 2^63 as f64; integral floats strictly inside (-2^63, 2^63) fold into the integer form.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// One canonical key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyAtom {
    /// Missing value or NaN. Never matches anything, including another null.
    Null,
    /// Any integer, or a float with an exact integer value.
    Int(i64),
    /// Bit pattern of a non-integral (or out of range) float.
    Float(u64),
    Bool(bool),
    Str(String),
}

impl KeyAtom {
    /// Canonicalize a typed value. String keys compare on their trimmed text; a blank one is null.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => KeyAtom::Null,
            Value::Int64(v) => KeyAtom::Int(*v),
            Value::Float64(v) => canonical_float(*v),
            Value::Bool(v) => KeyAtom::Bool(*v),
            Value::Utf8(s) => match s.trim() {
                "" => KeyAtom::Null,
                t => KeyAtom::Str(t.to_owned()),
            },
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            KeyAtom::Null => buf.push(0),
            KeyAtom::Int(v) => {
                buf.push(1);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            KeyAtom::Float(bits) => {
                buf.push(2);
                buf.extend_from_slice(&bits.to_le_bytes());
            }
            KeyAtom::Bool(v) => {
                buf.push(3);
                buf.push(u8::from(*v));
            }
            KeyAtom::Str(s) => {
                buf.push(4);
                buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
        }
    }
}

fn canonical_float(v: f64) -> KeyAtom {
    if v.is_nan() {
        KeyAtom::Null
    } else if v.fract() == 0.0 && v > -I64_BOUND && v < I64_BOUND {
        // Also folds -0.0 into 0.
        KeyAtom::Int(v as i64)
    } else {
        KeyAtom::Float(v.to_bits())
    }
}

/// Canonical key tuple of a row.
pub type KeyTuple = Vec<KeyAtom>;

/// Extract the canonical key of `row` from the columns at `key_idx`.
pub fn canonical_key(row: &[Value], key_idx: &[usize]) -> KeyTuple {
    key_idx
        .iter()
        .map(|&i| row.get(i).map(KeyAtom::from_value).unwrap_or(KeyAtom::Null))
        .collect()
}

/// Whether a key can match at all.
pub fn is_joinable(key: &[KeyAtom]) -> bool {
    !key.iter().any(|a| *a == KeyAtom::Null)
}

/// Process-independent hash of a canonical key tuple.
pub fn key_hash(key: &[KeyAtom]) -> u64 {
    let mut buf = Vec::with_capacity(16 * key.len());
    for atom in key {
        atom.encode(&mut buf);
    }
    xxh3_64_with_seed(&buf, SHARD_HASH_SEED)
}

/// Shard index in `[0, shard_count)` for a canonical key tuple.
pub fn shard_index(key: &[KeyAtom], shard_count: usize) -> usize {
    debug_assert!(shard_count > 0, "shard_count must be > 0");
    (key_hash(key) % shard_count as u64) as usize
}
