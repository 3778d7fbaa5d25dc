use async_trait::async_trait;

use crate::{
    error::Result,
    types::{GraphEdge, GraphNode, GraphStats},
};

pub mod memory;
pub mod neighborhood;

pub use memory::InMemoryGraphStore;
pub use neighborhood::RelationshipFilter;

/// Core trait defining graph store operations
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a node. Duplicate ids follow the store's id policy.
    async fn add_node(&self, node: GraphNode) -> Result<()>;

    /// Create an edge between two existing nodes; returns the stored edge with its weight clamped to [0, 1]
    async fn add_edge(&self, edge: GraphEdge) -> Result<GraphEdge>;

    /// Get a node by id
    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>>;

    /// Outgoing edges of a node, in insertion order
    async fn edges_from(&self, id: &str) -> Result<Vec<GraphEdge>>;

    /// Incoming and outgoing edges of a node, in insertion order
    async fn edges_of(&self, id: &str) -> Result<Vec<GraphEdge>>;

    /// Nodes reachable from `id` along outgoing edges within `max_depth` hops,
    /// excluding `id` itself. `relationship_types = None` follows every type.
    async fn neighbors(
        &self,
        id: &str,
        relationship_types: Option<&[String]>,
        max_depth: usize,
    ) -> Result<Vec<GraphNode>>;

    /// Node and edge counts
    async fn stats(&self) -> Result<GraphStats>;
}
