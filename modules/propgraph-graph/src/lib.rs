pub mod builder;
pub mod client;
pub mod encoder;
pub mod neo4j;
pub mod repository;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use builder::Statement;
pub use client::{BackendError, ClientOptions, FailureKind, GraphBackend, GraphClient};
pub use neo4j::Neo4jBackend;
pub use repository::GraphRepository;

pub use propgraph_common::{
    BoundParams, Config, GraphError, NodeMatcher, NodeRecord, NodeSpec, PropertyMap,
    PropertyValue, RelationshipRecord, RelationshipSpec, RelationshipWrite, Result, ResultValue,
    Row, StoreMessage, ValueKind,
};
