pub mod collection;
pub mod memory;

pub use collection::{Keyed, PagedCollection};
pub use memory::{Fixture, FixtureGroup, InMemoryProvider, ProviderCall, ProviderOp};
