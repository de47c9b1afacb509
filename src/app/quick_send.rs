//! The ordered quick-send list

use serde::{Deserialize, Serialize};

use crate::protocol::QueueItem;

/// Saved items in display order. Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuickSendList {
    items: Vec<QueueItem>,
}

impl QuickSendList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueueItem> {
        self.items.iter()
    }

    pub fn push(&mut self, item: QueueItem) {
        self.items.push(item);
    }

    pub fn remove(&mut self, index: usize) -> Option<QueueItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Replace the item at `index`, returning the old one
    pub fn replace(&mut self, index: usize, item: QueueItem) -> Option<QueueItem> {
        self.items
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, item))
    }

    /// Returns false when `index` is out of range
    pub fn set_checked(&mut self, index: usize, checked: bool) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.checked = checked;
                true
            }
            None => false,
        }
    }

    pub fn checked_items(&self) -> impl Iterator<Item = &QueueItem> + '_ {
        self.items.iter().filter(|item| item.checked)
    }
}

impl From<Vec<QueueItem>> for QuickSendList {
    fn from(items: Vec<QueueItem>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a QuickSendList {
    type Item = &'a QueueItem;
    type IntoIter = std::slice::Iter<'a, QueueItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuickSendList {
        QuickSendList::from(vec![
            QueueItem::text("a"),
            QueueItem::text("b").with_checked(false),
            QueueItem::text("c"),
        ])
    }

    #[test]
    fn test_checked_items_in_order() {
        let list = sample();
        let names: Vec<_> = list.checked_items().map(|i| i.content.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_edit_operations() {
        let mut list = sample();
        assert_eq!(list.remove(1).unwrap().content, "b");
        assert!(list.remove(5).is_none());

        let old = list.replace(0, QueueItem::hex("01")).unwrap();
        assert_eq!(old.content, "a");
        assert!(list.get(0).unwrap().is_hex);

        assert!(list.set_checked(1, false));
        assert!(!list.set_checked(9, true));
        assert_eq!(list.checked_items().count(), 1);
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.starts_with('['));
        let back: QuickSendList = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
