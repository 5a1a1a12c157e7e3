//! GraphQL subscriptions for real-time updates
//!
//! Subscriptions allow clients to receive push updates over WebSocket. Each
//! subscription holds its own registration on the event bus; the registration
//! is released when the stream is dropped, which happens when the client sends
//! `complete` or the connection goes away.

use async_graphql::{Context, Subscription};
use futures::Stream;

use crate::services::Topic;

use super::types::{Book, BookEvents};

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Books added after the subscription started
    async fn book_added<'ctx>(&self, ctx: &Context<'ctx>) -> impl Stream<Item = Book> + 'ctx {
        let events = ctx.data_unchecked::<BookEvents>();
        let subscription = events.subscribe(Topic::BookAdded);

        let handle = subscription.handle();
        tracing::debug!(
            topic = %handle.topic(),
            subscriber = %handle.id(),
            "bookAdded subscription opened"
        );

        subscription
    }
}
