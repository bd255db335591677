//! Collection queries: equality and range filters, ordering and limits.
//!
//! [`Query::apply`] evaluates a query locally with the hosted store's
//! comparison rules: values only compare against values of the same JSON
//! type, strings compare by UTF-8 bytes and documents missing a filtered or
//! ordered field are excluded.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::Document;
use crate::path::CollectionPath;

/// Upper sentinel for prefix ranges. The highest code point in the Unicode
/// private use area sorts after any realistic name continuation.
pub const PREFIX_SENTINEL: char = '\u{f8ff}';

/// Filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// `field <op> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A query over one collection.
///
/// Filters are combined with logical AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// Every document in `collection`.
    #[must_use]
    pub const fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_owned(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Match string values of `field` starting with `term`.
    ///
    /// Expressed as the range `[term, term + PREFIX_SENTINEL]` so the hosted
    /// store can serve it from an index.
    #[must_use]
    pub fn prefix(self, field: &str, term: &str) -> Self {
        let upper = format!("{term}{PREFIX_SENTINEL}");
        self.filter(field, FilterOp::Gte, term)
            .filter(field, FilterOp::Lte, upper)
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_owned(),
            direction,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `doc` lives in the queried collection and passes every filter.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        doc.path.collection() == self.collection && self.filters.iter().all(|f| f.matches(doc))
    }

    /// Evaluate the query over a set of candidate documents.
    #[must_use]
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut results: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.matches(doc))
            .filter(|doc| self.order_by.iter().all(|o| doc.get(&o.field).is_some()))
            .collect();

        results.sort_by(|a, b| {
            for order in &self.order_by {
                let (Some(left), Some(right)) = (a.get(&order.field), b.get(&order.field)) else {
                    continue;
                };
                let ordering = compare_values(left, right);
                let ordering = match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.path.cmp(&b.path)
        });

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field) else {
            return false;
        };
        if type_rank(actual) != type_rank(&self.value) {
            return false;
        }
        let ordering = compare_values(actual, &self.value);
        match self.op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
        }
    }
}

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::path::{DocumentPath, products};
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        Document::new(
            DocumentPath::parse(&format!("products/{id}")).unwrap(),
            fields.as_object().cloned().unwrap(),
        )
    }

    fn catalog() -> Vec<Document> {
        vec![
            doc("p1", json!({"name": "Shirt", "category": "Apparel", "price": 20})),
            doc("p2", json!({"name": "Shoes", "category": "Apparel", "price": 50})),
            doc("p3", json!({"name": "T-Shirt", "category": "Apparel", "price": 15})),
            doc("p4", json!({"name": "Shovel", "category": "Home Goods", "price": 30.5})),
            doc("p5", json!({"name": "Sh", "category": "Stationery", "price": 1})),
        ]
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(Document::id).collect()
    }

    #[test]
    fn test_prefix_range() {
        let results = Query::new(products()).prefix("name", "Sh").apply(catalog());
        assert_eq!(ids(&results), ["p1", "p2", "p4", "p5"]);
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        let results = Query::new(products()).prefix("name", "sh").apply(catalog());
        assert!(results.is_empty());
    }

    #[test]
    fn test_filters_are_anded() {
        let results = Query::new(products())
            .where_eq("category", "Apparel")
            .prefix("name", "Sh")
            .apply(catalog());
        assert_eq!(ids(&results), ["p1", "p2"]);
    }

    #[test]
    fn test_order_and_limit() {
        let results = Query::new(products())
            .order_by("price", Direction::Descending)
            .limit(2)
            .apply(catalog());
        assert_eq!(ids(&results), ["p2", "p4"]);
    }

    #[test]
    fn test_missing_field_excluded() {
        let mut docs = catalog();
        docs.push(doc("p6", json!({"name": "Mystery"})));
        let results = Query::new(products())
            .order_by("price", Direction::Ascending)
            .apply(docs.clone());
        assert!(!ids(&results).contains(&"p6"));
        let results = Query::new(products()).apply(docs);
        assert!(ids(&results).contains(&"p6"));
    }

    #[test]
    fn test_type_mismatch_never_matches() {
        let results = Query::new(products())
            .filter("price", FilterOp::Gte, "0")
            .apply(catalog());
        assert!(results.is_empty());
    }

    #[test]
    fn test_other_collections_excluded() {
        let mut docs = catalog();
        docs.push(Document::new(
            DocumentPath::parse("users/u1/cart/p1").unwrap(),
            json!({"name": "Shirt"}).as_object().cloned().unwrap(),
        ));
        let results = Query::new(products()).where_eq("name", "Shirt").apply(docs);
        assert_eq!(ids(&results), ["p1"]);
    }

    #[test]
    fn test_integer_and_float_compare_numerically() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!(2), &json!(10.5)), Ordering::Less);
    }
}
