//! HyperLogLog operations (PFADD, PFCOUNT, PFMERGE)
//!
//! Multi-key counting and merging need sketches from keys that may live in
//! other shards, so the store hands out copies and accepts merges; the
//! engine combines them.

use super::{MemoryStore, Value};
use crate::error::Result;
use crate::types::HyperLogLog;
use bytes::Bytes;

impl MemoryStore {
    /// Add elements, creating the sketch if needed
    ///
    /// Returns true if the sketch was created or any register changed.
    pub fn pfadd(&mut self, key: &Bytes, elements: &[Bytes]) -> Result<bool> {
        let created = !self.exists(key);
        let hll = self
            .get_or_insert_with(key, Value::empty_hyperloglog)
            .as_hyperloglog_mut()?;

        let mut changed = false;
        for element in elements {
            changed |= hll.add(element);
        }
        if changed {
            self.touch(key);
        }
        Ok(created || changed)
    }

    /// Estimated cardinality of one sketch; 0 for a missing key
    pub fn pfcount(&mut self, key: &[u8]) -> Result<u64> {
        match self.get(key) {
            Some(value) => Ok(value.as_hyperloglog()?.estimate()),
            None => Ok(0),
        }
    }

    /// Copy of the sketch stored at `key`
    pub fn hll_sketch(&mut self, key: &[u8]) -> Result<Option<HyperLogLog>> {
        match self.get(key) {
            Some(value) => Ok(Some(value.as_hyperloglog()?.clone())),
            None => Ok(None),
        }
    }

    /// Fold `sketch` into the sketch at `dest`, creating it if needed
    pub fn hll_merge_into(&mut self, dest: &Bytes, sketch: &HyperLogLog) -> Result<()> {
        let hll = self
            .get_or_insert_with(dest, Value::empty_hyperloglog)
            .as_hyperloglog_mut()?;
        hll.merge(sketch);
        self.touch(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn elements(items: &[&'static str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(*s)).collect()
    }

    #[test]
    fn test_pfadd_pfcount() {
        let mut store = MemoryStore::new();
        let key = Bytes::from("visitors");
        assert!(store.pfadd(&key, &elements(&["a", "b", "c", "d", "e", "f", "g"])).unwrap());
        assert!(!store.pfadd(&key, &elements(&["a", "b"])).unwrap());

        let count = store.pfcount(b"visitors").unwrap();
        assert!((6..=8).contains(&count), "estimate {} out of range", count);
        assert_eq!(store.pfcount(b"missing").unwrap(), 0);
    }

    #[test]
    fn test_pfadd_creates_empty_sketch() {
        let mut store = MemoryStore::new();
        assert!(store.pfadd(&Bytes::from("h"), &[]).unwrap());
        assert_eq!(store.type_of(b"h"), Some("hyperloglog"));
        assert_eq!(store.pfcount(b"h").unwrap(), 0);
    }

    #[test]
    fn test_merge_into() {
        let mut store = MemoryStore::new();
        let a = Bytes::from("a");
        store.pfadd(&a, &elements(&["1", "2", "3"])).unwrap();
        let sketch = store.hll_sketch(b"a").unwrap().unwrap();

        let dest = Bytes::from("dest");
        store.pfadd(&dest, &elements(&["3", "4"])).unwrap();
        store.hll_merge_into(&dest, &sketch).unwrap();
        let count = store.pfcount(b"dest").unwrap();
        assert!((3..=5).contains(&count), "estimate {} out of range", count);
    }

    #[test]
    fn test_pf_wrong_type() {
        let mut store = MemoryStore::new();
        store.set_string(Bytes::from("s"), Bytes::from("x"), None).unwrap();
        assert!(matches!(store.pfcount(b"s"), Err(StoreError::TypeMismatch { .. })));
        assert!(matches!(
            store.pfadd(&Bytes::from("s"), &elements(&["a"])),
            Err(StoreError::TypeMismatch { .. })
        ));
    }
}
