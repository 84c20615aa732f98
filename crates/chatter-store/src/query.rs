//! Collection queries: equality filters, a single order field and an
//! optional limit.
//!
//! Queries are evaluated in-process over the documents of one collection, so
//! every backend shares the exact same semantics.  As in the hosted store the
//! data model comes from, a document that lacks the order field is not part
//! of an ordered result.

use std::cmp::Ordering;

use serde_json::Value;

use crate::document::Document;
use crate::path::CollectionPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// The field is present and differs from the value.
    NotEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        let actual = doc.get(&self.field);
        match self.op {
            FilterOp::NotEqual => actual.is_some() && actual != Some(&self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filter, order and truncate the documents of `self.collection`.
    ///
    /// Without an order field, documents come back in creation order.  Equal
    /// order values are broken by creation order, reversed for descending
    /// queries.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|doc| doc.path().parent() == self.collection)
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .filter(|doc| match &self.order_by {
                Some(order) => doc.get(&order.field).is_some(),
                None => true,
            })
            .collect();

        match &self.order_by {
            Some(order) => out.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.field).unwrap_or(&Value::Null),
                    b.get(&order.field).unwrap_or(&Value::Null),
                )
                .then_with(|| a.seq().cmp(&b.seq()));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }),
            None => out.sort_by_key(Document::seq),
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y) {
                let ord = compare_values(xi, yi);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(coll: &CollectionPath, id: &str, seq: u64, fields: Value) -> Document {
        Document::new(
            coll.doc(id).unwrap(),
            fields.as_object().cloned().unwrap(),
            seq,
        )
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(Document::id).collect()
    }

    #[test]
    fn test_orders_with_seq_tiebreak() {
        let coll = CollectionPath::root("m").unwrap();
        let docs = vec![
            doc(&coll, "c", 3, json!({"at": 5})),
            doc(&coll, "a", 1, json!({"at": 5})),
            doc(&coll, "b", 2, json!({"at": 1})),
        ];

        let asc = Query::new(coll.clone()).order_by("at", Direction::Ascending);
        assert_eq!(ids(&asc.apply(docs.clone())), ["b", "a", "c"]);

        let desc = Query::new(coll).order_by("at", Direction::Descending);
        assert_eq!(ids(&desc.apply(docs)), ["c", "a", "b"]);
    }

    #[test]
    fn test_missing_order_field_excluded() {
        let coll = CollectionPath::root("m").unwrap();
        let docs = vec![
            doc(&coll, "a", 1, json!({"at": 1})),
            doc(&coll, "b", 2, json!({"other": true})),
        ];
        let q = Query::new(coll).order_by("at", Direction::Ascending);
        assert_eq!(ids(&q.apply(docs)), ["a"]);
    }

    #[test]
    fn test_filters_and_limit() {
        let coll = CollectionPath::root("users").unwrap();
        let docs = vec![
            doc(&coll, "u1", 1, json!({"uid": "u1"})),
            doc(&coll, "u2", 2, json!({"uid": "u2"})),
            doc(&coll, "u3", 3, json!({"name": "no uid"})),
        ];

        let q = Query::new(coll.clone()).filter("uid", FilterOp::NotEqual, "u1");
        assert_eq!(ids(&q.apply(docs.clone())), ["u2"]);

        let q = Query::new(coll).limit(1);
        assert_eq!(ids(&q.apply(docs)), ["u1"]);
    }

    #[test]
    fn test_other_collections_ignored() {
        let a = CollectionPath::root("a").unwrap();
        let b = CollectionPath::root("b").unwrap();
        let docs = vec![doc(&a, "x", 1, json!({})), doc(&b, "y", 2, json!({}))];
        assert_eq!(ids(&Query::new(a).apply(docs)), ["x"]);
    }

    #[test]
    fn test_compare_values_across_types() {
        assert_eq!(compare_values(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(null), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(1.5), &json!(1)), Ordering::Greater);
    }
}
