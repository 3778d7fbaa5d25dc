//! In-memory graph backend with insertion-ordered adjacency lists.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{Error, Result},
    graph::{
        neighborhood::{expand, RelationshipFilter},
        GraphStore,
    },
    types::{clamp_weight, GraphEdge, GraphNode, GraphStats, IdPolicy},
};

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    /// Node id to indices into `edges`
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl GraphState {
    fn find_edge(&self, edge: &GraphEdge) -> Option<usize> {
        self.outgoing
            .get(&edge.source)?
            .iter()
            .copied()
            .find(|&idx| self.edges[idx].same_identity(edge))
    }

    fn outgoing_edges(&self, id: &str) -> impl Iterator<Item = &GraphEdge> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }
}

/// Graph store held entirely in memory
#[derive(Debug)]
pub struct InMemoryGraphStore {
    policy: IdPolicy,
    max_visited: usize,
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    pub fn new(policy: IdPolicy) -> Self {
        Self::with_visit_limit(policy, usize::MAX)
    }

    /// Cap on nodes visited by a single `neighbors` expansion
    pub fn with_visit_limit(policy: IdPolicy, max_visited: usize) -> Self {
        Self {
            policy,
            max_visited: max_visited.max(1),
            state: RwLock::new(GraphState::default()),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new(IdPolicy::default())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn add_node(&self, node: GraphNode) -> Result<()> {
        if node.id.trim().is_empty() {
            return Err(Error::Validation("node id must not be empty".into()));
        }
        if node.label.trim().is_empty() {
            return Err(Error::Validation(format!("node {} has an empty label", node.id)));
        }
        node.metadata.validate()?;

        let mut state = self.state.write().await;
        if let Some(existing) = state.nodes.get_mut(&node.id) {
            return match self.policy {
                IdPolicy::Reject => Err(Error::Conflict(format!("node {}", node.id))),
                IdPolicy::Upsert => {
                    debug!(id = %node.id, "Replacing node");
                    existing.label = node.label;
                    existing.metadata = node.metadata;
                    Ok(())
                }
            };
        }
        debug!(id = %node.id, label = %node.label, "Adding node");
        state.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn add_edge(&self, edge: GraphEdge) -> Result<GraphEdge> {
        if edge.relationship_type.trim().is_empty() {
            return Err(Error::Validation("relationship type must not be empty".into()));
        }
        let mut edge = edge;
        edge.weight = clamp_weight(edge.weight)?;

        let mut state = self.state.write().await;
        for endpoint in [&edge.source, &edge.target] {
            if !state.nodes.contains_key(endpoint.as_str()) {
                return Err(Error::NotFound(format!("node {}", endpoint)));
            }
        }

        if let Some(idx) = state.find_edge(&edge) {
            return match self.policy {
                IdPolicy::Reject => Err(Error::Conflict(format!(
                    "edge {} -[{}]-> {}",
                    edge.source, edge.relationship_type, edge.target
                ))),
                IdPolicy::Upsert => {
                    state.edges[idx].weight = edge.weight;
                    Ok(state.edges[idx].clone())
                }
            };
        }

        debug!(
            source = %edge.source,
            target = %edge.target,
            relationship = %edge.relationship_type,
            "Adding edge"
        );
        let idx = state.edges.len();
        state.outgoing.entry(edge.source.clone()).or_default().push(idx);
        if edge.source != edge.target {
            state.incoming.entry(edge.target.clone()).or_default().push(idx);
        }
        state.edges.push(edge.clone());
        Ok(edge)
    }

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>> {
        Ok(self.state.read().await.nodes.get(id).cloned())
    }

    async fn edges_from(&self, id: &str) -> Result<Vec<GraphEdge>> {
        let state = self.state.read().await;
        Ok(state.outgoing_edges(id).cloned().collect())
    }

    async fn edges_of(&self, id: &str) -> Result<Vec<GraphEdge>> {
        let state = self.state.read().await;
        let mut indices: Vec<usize> = state
            .outgoing
            .get(id)
            .into_iter()
            .chain(state.incoming.get(id))
            .flatten()
            .copied()
            .collect();
        indices.sort_unstable();
        Ok(indices.into_iter().map(|idx| state.edges[idx].clone()).collect())
    }

    async fn neighbors(
        &self,
        id: &str,
        relationship_types: Option<&[String]>,
        max_depth: usize,
    ) -> Result<Vec<GraphNode>> {
        let filter = RelationshipFilter::new(relationship_types);
        let state = self.state.read().await;
        if !state.nodes.contains_key(id) {
            return Err(Error::NotFound(format!("node {}", id)));
        }

        let expansion = expand(id, max_depth, self.max_visited, |node| {
            state
                .outgoing_edges(node)
                .filter(|e| filter.allows(&e.relationship_type))
                .map(|e| e.target.clone())
                .collect()
        });
        if expansion.truncated {
            debug!(start = %id, limit = self.max_visited, "Neighborhood expansion truncated");
        }

        Ok(expansion
            .reached
            .into_iter()
            .filter_map(|(node_id, _)| state.nodes.get(&node_id).cloned())
            .collect())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.state.read().await;
        Ok(GraphStats {
            total_nodes: state.nodes.len(),
            total_edges: state.edges.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn store_with(nodes: &[&str], policy: IdPolicy) -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new(policy);
        for id in nodes {
            store.add_node(GraphNode::new(*id, "Concept")).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_edge_requires_existing_endpoints() {
        let store = store_with(&["a"], IdPolicy::Reject).await;
        let err = store.add_edge(GraphEdge::new("a", "missing", "USES", 0.5)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.stats().await.unwrap().total_edges, 0);
    }

    #[tokio::test]
    async fn test_edge_weight_is_clamped() {
        let store = store_with(&["a", "b"], IdPolicy::Reject).await;
        let stored = store.add_edge(GraphEdge::new("a", "b", "USES", 3.0)).await.unwrap();
        assert_eq!(stored.weight, 1.0);
        assert!(matches!(
            store.add_edge(GraphEdge::new("b", "a", "USES", f32::INFINITY)).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_policies() {
        let reject = store_with(&["a", "b"], IdPolicy::Reject).await;
        assert!(matches!(
            reject.add_node(GraphNode::new("a", "Other")).await,
            Err(Error::Conflict(_))
        ));
        reject.add_edge(GraphEdge::new("a", "b", "USES", 0.5)).await.unwrap();
        assert!(matches!(
            reject.add_edge(GraphEdge::new("a", "b", "USES", 0.9)).await,
            Err(Error::Conflict(_))
        ));

        let upsert = store_with(&["a", "b"], IdPolicy::Upsert).await;
        upsert.add_node(GraphNode::new("a", "Other")).await.unwrap();
        assert_eq!(upsert.get_node("a").await.unwrap().unwrap().label, "Other");
        upsert.add_edge(GraphEdge::new("a", "b", "USES", 0.5)).await.unwrap();
        upsert.add_edge(GraphEdge::new("a", "b", "USES", 0.9)).await.unwrap();
        let edges = upsert.edges_from("a").await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 0.9);
    }

    #[tokio::test]
    async fn test_edges_of_includes_both_directions() {
        let store = store_with(&["a", "b", "c"], IdPolicy::Reject).await;
        store.add_edge(GraphEdge::new("a", "b", "USES", 0.5)).await.unwrap();
        store.add_edge(GraphEdge::new("c", "a", "MENTIONS", 0.4)).await.unwrap();
        store.add_edge(GraphEdge::new("b", "c", "USES", 0.3)).await.unwrap();

        let incident = store.edges_of("a").await.unwrap();
        assert_eq!(incident.len(), 2);
        assert_eq!(incident[0].target, "b");
        assert_eq!(incident[1].source, "c");
        assert_eq!(store.edges_from("a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_neighbors_follow_filter_and_depth() {
        let store = store_with(&["a", "b", "c", "d"], IdPolicy::Reject).await;
        store.add_edge(GraphEdge::new("a", "b", "USES", 0.5)).await.unwrap();
        store.add_edge(GraphEdge::new("b", "c", "USES", 0.5)).await.unwrap();
        store.add_edge(GraphEdge::new("a", "d", "MENTIONS", 0.5)).await.unwrap();

        let ids = |nodes: Vec<GraphNode>| nodes.into_iter().map(|n| n.id).collect::<Vec<_>>();

        assert_eq!(ids(store.neighbors("a", None, 1).await.unwrap()), vec!["b", "d"]);
        assert_eq!(ids(store.neighbors("a", None, 2).await.unwrap()), vec!["b", "d", "c"]);

        let uses = vec!["USES".to_string()];
        assert_eq!(
            ids(store.neighbors("a", Some(&uses), 5).await.unwrap()),
            vec!["b", "c"]
        );
        assert!(store.neighbors("a", None, 0).await.unwrap().is_empty());
        assert!(matches!(
            store.neighbors("zzz", None, 2).await,
            Err(Error::NotFound(_))
        ));
    }
}
