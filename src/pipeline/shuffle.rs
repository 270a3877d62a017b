//! Hash-based reshuffle between stages 1→2 and 2→3.
//!
//! Records cross the shuffle as opaque, length-delimited bytes; the only
//! contract is bijective `(key, value)` round trips. We use `rmp-serde`
//! (MessagePack) for that encoding and `xxhash-rust`'s xxh3 for the
//! partition hash.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

/// N = `reducers_per_slot`× map slots for the prefix shuffle, rounded up.
pub fn reducer_count_for_prefixes(map_slots: usize, reducers_per_slot: f64) -> usize {
	(((map_slots.max(1) as f64) * reducers_per_slot).ceil() as usize).max(1)
}

/// N = `reducers_per_slot`× map slots for the version shuffle, rounded up.
pub fn reducer_count_for_versions(map_slots: usize, reducers_per_slot: f64) -> usize {
	(((map_slots.max(1) as f64) * reducers_per_slot).ceil() as usize).max(1)
}

/// Encode a `(key, value)` pair as the opaque bytes that cross the shuffle.
pub fn encode<K: Serialize, V: Serialize>(k: &K, v: &V) -> Result<Vec<u8>, Error> {
	Ok(rmp_serde::to_vec(&(k, v))?)
}

/// Inverse of `encode`.
pub fn decode<K: DeserializeOwned, V: DeserializeOwned>(bytes: &[u8]) -> Result<(K, V), Error> {
	Ok(rmp_serde::from_slice(bytes)?)
}

/// Repartition `items` into `reducers` buckets by `hash(encode(k, v))`,
/// emitting each `(k, v)` unchanged on the other side. Every item
/// genuinely round-trips through the wire encoding, even though this
/// local realization keeps all reducers in one process.
pub fn shuffle<K, V>(items: Vec<(K, V)>, reducers: usize) -> Result<Vec<Vec<(K, V)>>, Error>
where
	K: Serialize + DeserializeOwned,
	V: Serialize + DeserializeOwned,
{
	let reducers = reducers.max(1);
	let mut out: Vec<Vec<(K, V)>> = (0..reducers).map(|_| Vec::new()).collect();

	for (k, v) in items {
		let bytes = encode(&k, &v)?;
		let hash = xxhash_rust::xxh3::xxh3_64(&bytes);
		let (k, v): (K, V) = decode(&bytes)?;
		let idx = (hash % reducers as u64) as usize;
		out[idx].push((k, v));
	}

	Ok(out)
}

#[cfg(test)]
mod test {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn reducer_counts_match_contract() {
		assert_eq!(reducer_count_for_prefixes(2, 3.5), 7);
		assert_eq!(reducer_count_for_versions(2, 1.0), 2);
		assert_eq!(reducer_count_for_prefixes(0, 3.5), 4); // max(1) floor, 3.5 -> 4
	}

	#[test]
	fn encode_decode_roundtrip() {
		let (k, v): (String, i32) = decode(&encode(&"key".to_string(), &42).unwrap()).unwrap();
		assert_eq!(k, "key");
		assert_eq!(v, 42);
	}

	#[test]
	fn shuffle_preserves_multiset() {
		let items: Vec<(String, i32)> = (0..200).map(|i| (format!("key-{}", i), i)).collect();
		let expected: HashMap<String, i32> = items.iter().cloned().collect();

		let shuffled = shuffle(items, 8).unwrap();
		assert_eq!(shuffled.len(), 8);

		let mut actual: HashMap<String, i32> = HashMap::new();
		for bucket in shuffled {
			for (k, v) in bucket {
				actual.insert(k, v);
			}
		}
		assert_eq!(actual, expected);
	}

	#[test]
	fn shuffle_is_deterministic_for_given_hash() {
		let items = vec![("a".to_string(), 1), ("b".to_string(), 2)];
		let s1 = shuffle(items.clone(), 4).unwrap();
		let s2 = shuffle(items, 4).unwrap();
		assert_eq!(s1, s2);
	}
}
