pub(crate) mod hydration;
pub(crate) mod query;

pub(crate) use hydration::{boot_snapshot, hydrate};
pub(crate) use query::{QueryCache, QueryKey, QueryPayload, Resource};
