use crate::objects::Object;

/// A PDF dictionary that keeps keys in insertion order.
///
/// Output must be byte-for-byte reproducible, so entries are serialized in
/// the order they were set. Setting an existing key replaces its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: Vec<(String, Object)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Object>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Object> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl FromIterator<(String, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, Object)>>(iter: T) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.set(key, value);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dictionary() {
        let dict = Dictionary::new();
        assert!(dict.is_empty());
        assert_eq!(dict.len(), 0);
        assert!(Dictionary::with_capacity(4).is_empty());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("XObject"));
        dict.set("Subtype", Object::name("Image"));
        dict.set("Width", 100);
        dict.set("Height", 50);

        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec!["Type", "Subtype", "Width", "Height"]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut dict = Dictionary::new();
        dict.set("A", 1);
        dict.set("B", 2);
        dict.set("A", 3);

        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("A"), Some(&Object::Integer(3)));
        assert_eq!(dict.keys().next().map(String::as_str), Some("A"));
    }

    #[test]
    fn test_remove() {
        let mut dict = Dictionary::new();
        dict.set("Count", 3);
        assert!(dict.contains_key("Count"));
        assert_eq!(dict.remove("Count"), Some(Object::Integer(3)));
        assert!(!dict.contains_key("Count"));
        assert_eq!(dict.remove("Count"), None);
    }

    #[test]
    fn test_from_iterator() {
        let dict: Dictionary = vec![
            ("First".to_string(), Object::Integer(1)),
            ("Last".to_string(), Object::Integer(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get("Last"), Some(&Object::Integer(2)));
    }
}
