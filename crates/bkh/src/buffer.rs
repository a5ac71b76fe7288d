// human
use crate::backends::CollectionRef;

/// Per-collection accumulator: the documents waiting to be bulk-written,
/// plus the store handle they'll be written through.
///
/// Owned exclusively by one consumer, created lazily on the first record
/// for a collection, never dropped afterwards. `pending` is non-empty only
/// between the first buffered document since the last flush and the next
/// flush of this collection.
#[derive(Debug)]
pub(crate) struct CollectionBuffer {
    handle: CollectionRef,
    pending: Vec<String>,
}

impl CollectionBuffer {
    pub(crate) fn new(handle: CollectionRef) -> Self {
        Self {
            handle,
            pending: Vec::new(),
        }
    }

    pub(crate) fn handle(&self) -> &CollectionRef {
        &self.handle
    }

    /// Append one document. Insertion order = arrival order, and the drain
    /// below preserves it, so per-collection ordering survives end to end.
    pub(crate) fn push(&mut self, document: String) {
        self.pending.push(document);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take everything, leave an empty buffer behind.
    pub(crate) fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> CollectionBuffer {
        CollectionBuffer::new(CollectionRef::new("alpha", "alpha"))
    }

    #[test]
    fn push_preserves_arrival_order() {
        let mut buffer = buffer();
        buffer.push("one".to_string());
        buffer.push("two".to_string());
        buffer.push("three".to_string());
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.drain(), vec!["one", "two", "three"]);
    }

    #[test]
    fn drain_resets_to_empty_and_can_refill() {
        let mut buffer = buffer();
        buffer.push("one".to_string());
        assert!(!buffer.is_empty());
        assert_eq!(buffer.drain(), vec!["one"]);
        assert!(buffer.is_empty());
        // the buffer survives the drain and keeps accumulating
        buffer.push("two".to_string());
        assert_eq!(buffer.drain(), vec!["two"]);
    }

    #[test]
    fn draining_an_empty_buffer_yields_nothing() {
        let mut buffer = buffer();
        assert!(buffer.drain().is_empty());
    }
}
