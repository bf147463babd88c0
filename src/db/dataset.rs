use std::collections::HashMap;

use serde_json::Value;

/// Read-only snapshot of the collections a set of queries needs.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    collections: HashMap<String, Vec<Value>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, documents: Vec<Value>) {
        self.collections.insert(name.into(), documents);
    }

    /// Documents of a collection in natural order. Unknown collections are empty.
    pub fn collection(&self, name: &str) -> &[Value] {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn document_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_collection_is_empty() {
        let dataset = Dataset::new();
        assert!(dataset.collection("products").is_empty());
        assert!(!dataset.contains("products"));
    }

    #[test]
    fn test_insert_and_count() {
        let mut dataset = Dataset::new();
        dataset.insert("products", vec![json!({"productID": 1})]);
        dataset.insert("cities", vec![json!({}), json!({})]);
        assert_eq!(dataset.collection("products").len(), 1);
        assert_eq!(dataset.document_count(), 3);
        let mut names: Vec<&str> = dataset.names().collect();
        names.sort();
        assert_eq!(names, vec!["cities", "products"]);
    }
}
