//! Multi-hop reasoning over typed relationships.
//!
//! Traversal is a level-by-level breadth-first expansion along outgoing
//! edges. Every node is reached at most once, at its shortest hop distance;
//! when several routes of that length exist the one whose last edge is
//! heaviest is kept, and remaining ties go to the route discovered first.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    graph::{GraphStore, RelationshipFilter},
    types::{GraphEdge, Path, PathStep},
};

/// Paths found by a traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiHopResult {
    pub start_id: String,
    /// Hop limit actually applied after the engine-wide cap
    pub hops: usize,
    pub relationship_types: Option<Vec<String>>,
    pub total_paths: usize,
    pub paths: Vec<Path>,
    /// Set when the visited-node ceiling cut the traversal short
    pub truncated: bool,
}

/// A route being extended during one BFS level
#[derive(Debug, Clone)]
struct Route {
    node: String,
    steps: Vec<PathStep>,
}

impl Route {
    fn extend(&self, edge: &GraphEdge) -> Route {
        let mut steps = self.steps.clone();
        steps.push(PathStep::from(edge));
        Route {
            node: edge.target.clone(),
            steps,
        }
    }

    fn last_weight(&self) -> f32 {
        self.steps.last().map(|s| s.weight).unwrap_or(0.0)
    }
}

pub struct MultiHopReasoner {
    graph: Arc<dyn GraphStore>,
    max_hops: usize,
    max_visited_nodes: usize,
}

impl MultiHopReasoner {
    pub fn new(graph: Arc<dyn GraphStore>, max_hops: usize, max_visited_nodes: usize) -> Self {
        Self {
            graph,
            max_hops: max_hops.max(1),
            max_visited_nodes: max_visited_nodes.max(1),
        }
    }

    pub async fn traverse(
        &self,
        start_id: &str,
        hops: usize,
        relationship_types: Option<&[String]>,
    ) -> Result<MultiHopResult> {
        if start_id.trim().is_empty() {
            return Err(Error::Validation("start_id is required".into()));
        }
        if hops == 0 {
            return Err(Error::Validation("hops must be at least 1".into()));
        }
        let hops = hops.min(self.max_hops);
        let filter = RelationshipFilter::new(relationship_types);

        let start = self
            .graph
            .get_node(start_id)
            .await
            .map_err(|e| Error::upstream("graph lookup", e))?
            .ok_or_else(|| Error::NotFound(format!("node {}", start_id)))?;

        let mut visited: HashSet<String> = HashSet::from([start_id.to_string()]);
        let mut frontier = vec![Route {
            node: start_id.to_string(),
            steps: Vec::new(),
        }];
        let mut reached: Vec<Route> = Vec::new();
        let mut truncated = false;

        for depth in 1..=hops {
            let lookups = frontier.iter().map(|route| self.graph.edges_from(&route.node));
            let outgoing = try_join_all(lookups)
                .await
                .map_err(|e| Error::upstream("graph traversal", e))?;

            let mut level: Vec<Route> = Vec::new();
            let mut index: HashMap<String, usize> = HashMap::new();
            for (route, edges) in frontier.iter().zip(&outgoing) {
                for edge in edges {
                    if !filter.allows(&edge.relationship_type) || visited.contains(&edge.target) {
                        continue;
                    }
                    match index.get(&edge.target) {
                        Some(&i) => {
                            if edge.weight > level[i].last_weight() {
                                level[i] = route.extend(edge);
                            }
                        }
                        None if visited.len() + level.len() < self.max_visited_nodes => {
                            index.insert(edge.target.clone(), level.len());
                            level.push(route.extend(edge));
                        }
                        None => truncated = true,
                    }
                }
            }

            debug!(depth, discovered = level.len(), "Expanded traversal level");
            if level.is_empty() {
                break;
            }
            visited.extend(level.iter().map(|r| r.node.clone()));
            reached.extend(level.iter().cloned());
            frontier = level;
            if truncated {
                break;
            }
        }

        let nodes = try_join_all(reached.iter().map(|r| self.graph.get_node(&r.node)))
            .await
            .map_err(|e| Error::upstream("graph lookup", e))?;
        let paths: Vec<Path> = reached
            .into_iter()
            .zip(nodes)
            .filter_map(|(route, node)| {
                node.map(|related| Path {
                    start: start.clone(),
                    related,
                    hop_count: route.steps.len(),
                    relationships: route.steps,
                })
            })
            .collect();

        histogram!("multi_hop_paths", paths.len() as f64);
        info!(
            start_id,
            hops,
            paths = paths.len(),
            truncated,
            "Multi-hop traversal completed"
        );

        Ok(MultiHopResult {
            start_id: start_id.to_string(),
            hops,
            relationship_types: filter.types(),
            total_paths: paths.len(),
            paths,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::types::{GraphNode, IdPolicy};
    use pretty_assertions::assert_eq;

    async fn graph(nodes: &[&str], edges: &[(&str, &str, &str, f32)]) -> Arc<InMemoryGraphStore> {
        let store = Arc::new(InMemoryGraphStore::new(IdPolicy::Reject));
        for id in nodes {
            store.add_node(GraphNode::new(*id, "Concept")).await.unwrap();
        }
        for (s, t, ty, w) in edges {
            store.add_edge(GraphEdge::new(*s, *t, *ty, *w)).await.unwrap();
        }
        store
    }

    fn summary(result: &MultiHopResult) -> Vec<(String, usize)> {
        result
            .paths
            .iter()
            .map(|p| (p.related.id.clone(), p.hop_count))
            .collect()
    }

    #[tokio::test]
    async fn test_shortest_route_wins_and_cycles_are_ignored() {
        let store = graph(
            &["a", "b", "c", "d"],
            &[
                ("a", "b", "USES", 0.5),
                ("b", "c", "USES", 0.5),
                ("c", "a", "USES", 0.5),
                ("a", "c", "USES", 0.2),
                ("c", "d", "USES", 0.5),
            ],
        )
        .await;
        let reasoner = MultiHopReasoner::new(store, 5, 100);
        let result = reasoner.traverse("a", 3, None).await.unwrap();

        assert_eq!(
            summary(&result),
            vec![("b".to_string(), 1), ("c".to_string(), 1), ("d".to_string(), 2)]
        );
        let to_d = &result.paths[2];
        assert_eq!(to_d.relationships[0].source, "a");
        assert_eq!(to_d.relationships[1].target, "d");
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_tie_prefers_heaviest_last_edge() {
        let store = graph(
            &["s", "x", "y", "t"],
            &[
                ("s", "x", "R", 0.9),
                ("s", "y", "R", 0.1),
                ("x", "t", "R", 0.3),
                ("y", "t", "R", 0.7),
            ],
        )
        .await;
        let reasoner = MultiHopReasoner::new(store, 5, 100);
        let result = reasoner.traverse("s", 2, None).await.unwrap();

        let to_t = result.paths.iter().find(|p| p.related.id == "t").unwrap();
        assert_eq!(to_t.hop_count, 2);
        assert_eq!(to_t.relationships[0].target, "y");
    }

    #[tokio::test]
    async fn test_relationship_filter_and_hop_cap() {
        let store = graph(
            &["a", "b", "c"],
            &[("a", "b", "USES", 0.9), ("a", "c", "MENTIONS", 0.9), ("b", "c", "USES", 0.9)],
        )
        .await;
        let reasoner = MultiHopReasoner::new(store, 1, 100);
        let uses = vec!["USES".to_string()];
        let result = reasoner.traverse("a", 4, Some(&uses)).await.unwrap();

        assert_eq!(result.hops, 1);
        assert_eq!(summary(&result), vec![("b".to_string(), 1)]);
        assert_eq!(result.relationship_types, Some(uses));
    }

    #[tokio::test]
    async fn test_visited_ceiling_truncates() {
        let store = graph(
            &["hub", "n1", "n2", "n3"],
            &[("hub", "n1", "R", 0.5), ("hub", "n2", "R", 0.5), ("hub", "n3", "R", 0.5)],
        )
        .await;
        let reasoner = MultiHopReasoner::new(store, 5, 3);
        let result = reasoner.traverse("hub", 2, None).await.unwrap();
        assert_eq!(result.total_paths, 2);
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let store = graph(&["a"], &[]).await;
        let reasoner = MultiHopReasoner::new(store, 5, 100);
        assert!(matches!(reasoner.traverse("zzz", 2, None).await, Err(Error::NotFound(_))));
        assert!(matches!(reasoner.traverse("a", 0, None).await, Err(Error::Validation(_))));
        assert!(matches!(reasoner.traverse("", 2, None).await, Err(Error::Validation(_))));

        let result = reasoner.traverse("a", 2, None).await.unwrap();
        assert_eq!(result.total_paths, 0);
    }
}
