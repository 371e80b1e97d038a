//! Equality and hashing for trait objects.
//!
//! Configuration frequently repeats the same predicate or transcoder. Trait
//! objects that extend [`DynKey`] can be compared and hashed so duplicates
//! collapse, without every implementor writing the plumbing by hand: any
//! `'static` type that is `Eq + Hash` gets it for free.

use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};

/// Type-erased `Eq + Hash`.
pub trait DynKey: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Returns `true` if `other` has the same concrete type and compares equal.
    fn dyn_eq(&self, other: &dyn Any) -> bool;

    /// Feed the concrete type and value into `state`.
    fn dyn_hash(&self, state: &mut dyn Hasher);
}

impl<T> DynKey for T
where
    T: Any + Eq + Hash + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    #[derive(PartialEq, Eq, Hash)]
    struct Suffix(String);

    #[derive(PartialEq, Eq, Hash)]
    struct Prefix(String);

    fn hash_of(key: &dyn DynKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.dyn_hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_equal_values_compare_and_hash_equal() {
        let a: Box<dyn DynKey> = Box::new(Suffix(".org".to_string()));
        let b: Box<dyn DynKey> = Box::new(Suffix(".org".to_string()));
        assert!(a.dyn_eq(b.as_any()));
        assert_eq!(hash_of(a.as_ref()), hash_of(b.as_ref()));
    }

    #[test]
    fn test_different_types_never_equal() {
        let a: Box<dyn DynKey> = Box::new(Suffix(".org".to_string()));
        let b: Box<dyn DynKey> = Box::new(Prefix(".org".to_string()));
        assert!(!a.dyn_eq(b.as_any()));
        assert_ne!(hash_of(a.as_ref()), hash_of(b.as_ref()));
    }
}
