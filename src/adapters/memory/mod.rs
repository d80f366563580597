mod directory;
mod message_store;
mod read_model;

pub use directory::{InMemoryDirectory, RealmFixture};
pub use message_store::InMemoryMessageStore;
pub use read_model::InMemoryMessageReadModel;
