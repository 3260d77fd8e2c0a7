//! Duplicate-free ordered collection of shared components.
//!
//! Providers and post-processors are registered in an order that matters
//! (merge order and property dependency order respectively), and the same
//! instance must never be registered twice. [`OrderedSet`] keeps insertion
//! order and rejects an `Arc` that points at an already-registered instance.

use std::fmt;
use std::sync::Arc;

/// Insertion-ordered set of `Arc<T>`, de-duplicated by pointer identity.
pub struct OrderedSet<T: ?Sized> {
    items: Vec<Arc<T>>,
}

impl<T: ?Sized> OrderedSet<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends `item` unless the same instance is already present.
    ///
    /// Returns `true` if the item was inserted.
    pub fn insert(&mut self, item: Arc<T>) -> bool {
        if self.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Builder-style [`OrderedSet::insert`].
    pub fn with(mut self, item: Arc<T>) -> Self {
        self.insert(item);
        self
    }

    pub fn contains(&self, item: &Arc<T>) -> bool {
        self.items.iter().any(|existing| Arc::ptr_eq(existing, item))
    }

    pub fn get(&self, index: usize) -> Option<&Arc<T>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: ?Sized> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for OrderedSet<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: ?Sized> FromIterator<Arc<T>> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = Arc<T>>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl<T: ?Sized> fmt::Debug for OrderedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSet")
            .field("len", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Item(&'static str);

    impl Named for Item {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_preserves_insertion_order() {
        let set: OrderedSet<dyn Named> = [
            Arc::new(Item("b")) as Arc<dyn Named>,
            Arc::new(Item("a")),
            Arc::new(Item("c")),
        ]
        .into_iter()
        .collect();

        let names: Vec<_> = set.iter().map(|item| item.name()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_rejects_same_instance() {
        let item: Arc<dyn Named> = Arc::new(Item("a"));
        let mut set = OrderedSet::new();

        assert!(set.insert(Arc::clone(&item)));
        assert!(!set.insert(Arc::clone(&item)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_accepts_distinct_instances_with_equal_content() {
        let set = OrderedSet::<dyn Named>::new()
            .with(Arc::new(Item("a")))
            .with(Arc::new(Item("a")));
        assert_eq!(set.len(), 2);
    }
}
