//! Client-side cache for server-derived data.
//!
//! This module keeps the last-known payload of every resource the views
//! asked for:
//! - Entries are keyed by resource type plus id ([`ResourceKey`])
//! - Concurrent reads of one key share a single request
//! - Mutations invalidate the entries their rules name, forcing a refetch
//! - Subscribers learn about invalidation through [`Subscription`]

mod key;
mod mutation;
mod remote;
mod store;

pub use key::{Resource, ResourceKey};
pub use mutation::Mutation;
pub use remote::Remote;
pub use store::{CacheEvent, ResourceCache, Subscription};
