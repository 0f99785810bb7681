//! Method signature hashing and the set of signatures seen during collection.
//!
//! When the members of a class are collected, the walk goes from the most derived type
//! up to its roots. An override and every method it overrides share one signature and
//! must surface once. [`SignatureSet`] buckets the methods seen so far by
//! [`signature_hash`] and confirms candidates with [`Method::signature_matches`], so
//! a hash collision never hides a method.

use std::{
    collections::HashMap,
    hash::{DefaultHasher, Hash, Hasher},
};

use crate::metadata::method::{Method, MethodRc};

// FNV-1a offset basis and prime, followed by a murmur3 finalizer round
const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0100_0000_01b3;
const AVALANCHE: u64 = 0xff51_afd7_ed55_8ccd;

fn mix(state: u64, component: &(impl Hash + ?Sized)) -> u64 {
    let mut hasher = DefaultHasher::new();
    component.hash(&mut hasher);

    let mut state = (state ^ hasher.finish()).wrapping_mul(PRIME);
    state ^= state >> 33;
    state = state.wrapping_mul(AVALANCHE);
    state ^ (state >> 33)
}

/// Hash over the parts of a method that [`Method::signature_matches`] compares:
/// name, generic arity, return type and the type and mode of every parameter, in
/// order.
#[must_use]
pub fn signature_hash(method: &Method) -> u64 {
    let state = mix(OFFSET_BASIS, method.name.as_str());
    let state = mix(state, &method.generic_params.len());
    let state = mix(state, &method.return_type);
    method
        .params
        .iter()
        .fold(state, |state, param| mix(mix(state, &param.sig), &param.mode))
}

/// Methods seen so far, bucketed by signature.
#[derive(Default)]
pub struct SignatureSet {
    buckets: HashMap<u64, Vec<MethodRc>>,
    len: usize,
}

impl SignatureSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a method with the signature of `method` was inserted.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.buckets
            .get(&signature_hash(method))
            .is_some_and(|bucket| bucket.iter().any(|seen| seen.signature_matches(method)))
    }

    /// Records `method`. Returns false if its signature was already present; the
    /// method is recorded either way.
    pub fn insert(&mut self, method: &MethodRc) -> bool {
        let bucket = self.buckets.entry(signature_hash(method)).or_default();
        let fresh = !bucket.iter().any(|seen| seen.signature_matches(method));
        bucket.push(method.clone());
        self.len += 1;
        fresh
    }

    /// Number of recorded methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
