/// Filter for listing documents in a collection.
///
/// Results are always returned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Collection to list.
    pub collection: String,

    /// Restrict to one partition.
    pub partition: Option<String>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query over a whole collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Filters by partition.
    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_builder_chain() {
        let query = DocumentQuery::collection("cart_items")
            .partition("sess_1")
            .limit(10)
            .offset(5);

        assert_eq!(query.collection, "cart_items");
        assert_eq!(query.partition.as_deref(), Some("sess_1"));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }
}
