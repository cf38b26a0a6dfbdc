mod product_search;

use std::sync::Arc;

use async_graphql::{EmptyMutation, EmptySubscription, MergedObject};

use crate::{outbound::ProductSource, settings::Marketplace};

/// A set of queries defined in the schema.
///
/// This is exposed only for [`Schema`], and not used directly.
#[derive(Default, MergedObject)]
pub(crate) struct Query(product_search::ProductSearchQuery);

pub(crate) type Schema = async_graphql::Schema<Query, EmptyMutation, EmptySubscription>;

/// The marketplace a schema searches, shared by every request.
pub(crate) type Source = Arc<dyn ProductSource>;

pub(crate) fn schema(source: Source, marketplace: Marketplace) -> Schema {
    Schema::build(Query::default(), EmptyMutation, EmptySubscription)
        .data(source)
        .data(marketplace)
        .finish()
}

#[cfg(test)]
struct TestSchema {
    schema: Schema,
}

#[cfg(test)]
impl TestSchema {
    fn new(source: crate::outbound::tests::FakeSource) -> Self {
        let schema = schema(Arc::new(source), Marketplace::default());
        Self { schema }
    }

    async fn execute(&self, query: &str) -> async_graphql::Response {
        let request: async_graphql::Request = query.into();
        self.schema.execute(request).await
    }
}
