//! Ingestion router: decides which stores receive a piece of text and fans the
//! writes out to them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    embedding::{fnv1a, Embedder},
    error::{Error, Result, StoreKind},
    graph::GraphStore,
    rag::{EntityExtractor, Extraction},
    types::{Document, GraphEdge, GraphNode, Metadata, StorageTarget},
    vector::VectorStore,
};

/// Label of the graph node that mirrors an ingested document
pub const DOCUMENT_LABEL: &str = "Document";
/// Relationship from a document node to the entities it contains
pub const MENTIONS: &str = "MENTIONS";
/// Node label used when none is supplied
pub const DEFAULT_NODE_LABEL: &str = "Entity";

/// Number of records written per store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataStored {
    pub documents: usize,
    pub nodes: usize,
    pub edges: usize,
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub routed_to: StorageTarget,
    pub cleaned_text_length: usize,
    pub data_stored: DataStored,
    /// Id of the stored document, when one was written
    pub document_id: Option<String>,
    /// Graph node ids of the extracted entities, in extraction order
    pub node_ids: Vec<String>,
    /// Relationships dropped because an endpoint was not extracted
    pub warnings: Vec<String>,
}

/// Graph writes derived from one extraction
#[derive(Debug, Default)]
struct GraphPlan {
    entity_nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Companion node for the document plus its MENTIONS edges
    document_node: Option<GraphNode>,
    mention_edges: Vec<GraphEdge>,
    warnings: Vec<String>,
}

/// Routes ingested text to the vector store, the graph store, or both
pub struct IngestionRouter {
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<dyn EntityExtractor>,
    dual_write: bool,
}

impl IngestionRouter {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn EntityExtractor>,
        dual_write: bool,
    ) -> Self {
        Self {
            vector,
            graph,
            embedder,
            extractor,
            dual_write,
        }
    }

    /// Extract, decide the storage target, and write to the selected stores
    pub async fn ingest(&self, raw_text: &str, metadata: Metadata) -> Result<IngestReport> {
        if raw_text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
        metadata.validate()?;

        let extraction = self
            .extractor
            .extract(raw_text)
            .await
            .map_err(|e| Error::upstream("entity extraction", e))?;
        if extraction.cleaned_text.is_empty() {
            return Err(Error::Validation("text is empty after cleaning".into()));
        }

        let target = StorageTarget::decide(extraction.has_entities(), self.dual_write);
        let document = if target.writes_vector() {
            let embedding = self.embed(&extraction.cleaned_text).await?;
            let id = format!("doc_{}", Uuid::new_v4().simple());
            Some(Document::new(id, extraction.cleaned_text.clone(), embedding, metadata.clone()))
        } else {
            None
        };

        let plan = if target.writes_graph() {
            plan_graph(&extraction, document.as_ref().map(|d| (d.id.as_str(), &metadata)))
        } else {
            GraphPlan::default()
        };
        for warning in &plan.warnings {
            warn!(%warning, "Dropping relationship");
        }

        let node_ids = plan.entity_nodes.iter().map(|n| n.id.clone()).collect();
        let warnings = plan.warnings.clone();
        let document_id = document.as_ref().map(|d| d.id.clone());

        let vector_write = async {
            match document {
                Some(doc) => self.vector.add(doc).await.map(|_| 1),
                None => Ok(0),
            }
        };
        let graph_write = async {
            if target.writes_graph() {
                self.write_graph(plan).await
            } else {
                Ok((0, 0))
            }
        };
        let (vector_result, graph_result) = tokio::join!(vector_write, graph_write);

        let (documents, (nodes, edges)) = settle(target, vector_result, graph_result)?;

        counter!("ingest_total", 1, "routed_to" => target.as_str());
        info!(
            routed_to = %target,
            documents,
            nodes,
            edges,
            warnings = warnings.len(),
            "Ingested text"
        );

        Ok(IngestReport {
            routed_to: target,
            cleaned_text_length: extraction.cleaned_text.chars().count(),
            data_stored: DataStored { documents, nodes, edges },
            document_id,
            node_ids,
            warnings,
        })
    }

    /// Create a graph node and a document sharing `id`
    pub async fn add_node_with_text(&self, id: &str, text: &str, metadata: Metadata) -> Result<GraphNode> {
        if id.trim().is_empty() {
            return Err(Error::Validation("id must not be empty".into()));
        }
        if text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".into()));
        }
        metadata.validate()?;

        let label = metadata
            .get_str("type")
            .or_else(|| metadata.get_str("label"))
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(DEFAULT_NODE_LABEL)
            .to_string();
        let embedding = self.embed(text).await?;

        let node = GraphNode::new(id, label).with_metadata(metadata.clone());
        let document = Document::new(id, text, embedding, metadata);

        let (vector_result, graph_result) =
            tokio::join!(self.vector.add(document), self.graph.add_node(node.clone()));
        settle(StorageTarget::Hybrid, vector_result, graph_result)?;

        info!(id = %node.id, label = %node.label, "Created node");
        Ok(node)
    }

    /// Create an edge between two existing nodes
    pub async fn add_edge(&self, edge: GraphEdge) -> Result<GraphEdge> {
        if edge.source.trim().is_empty() || edge.target.trim().is_empty() {
            return Err(Error::Validation("source and target must not be empty".into()));
        }
        let stored = self.graph.add_edge(edge).await?;
        info!(
            source = %stored.source,
            target = %stored.target,
            relationship = %stored.relationship_type,
            weight = stored.weight,
            "Created edge"
        );
        Ok(stored)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| Error::upstream("embedding", e))?;
        let expected = self.vector.dimension();
        if embedding.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    /// Returns the number of nodes and edges created
    async fn write_graph(&self, plan: GraphPlan) -> Result<(usize, usize)> {
        let mut nodes = 0;
        let mut edges = 0;

        for node in plan.entity_nodes.into_iter().chain(plan.document_node) {
            if self.graph.get_node(&node.id).await?.is_some() {
                debug!(id = %node.id, "Reusing existing node");
                continue;
            }
            // Another writer may have created the node since the lookup.
            match self.graph.add_node(node).await {
                Ok(()) => nodes += 1,
                Err(Error::Conflict(id)) => debug!(%id, "Node created concurrently, reusing it"),
                Err(e) => return Err(e),
            }
        }

        for edge in plan.edges.into_iter().chain(plan.mention_edges) {
            let exists = self
                .graph
                .edges_from(&edge.source)
                .await?
                .iter()
                .any(|e| e.same_identity(&edge));
            if exists {
                continue;
            }
            match self.graph.add_edge(edge).await {
                Ok(_) => edges += 1,
                Err(Error::Conflict(edge)) => debug!(%edge, "Edge created concurrently, skipping it"),
                Err(e) => return Err(e),
            }
        }

        Ok((nodes, edges))
    }
}

/// Turn the two write results into a single outcome. A write that was not
/// requested always reports `Ok`.
fn settle<V, G>(target: StorageTarget, vector: Result<V>, graph: Result<G>) -> Result<(V, G)> {
    match (vector, graph) {
        (Ok(v), Ok(g)) => Ok((v, g)),
        (Err(e), Ok(_)) if target == StorageTarget::Hybrid => Err(partial(StoreKind::Graph, StoreKind::Vector, e)),
        (Ok(_), Err(e)) if target == StorageTarget::Hybrid => Err(partial(StoreKind::Vector, StoreKind::Graph, e)),
        (Err(e), Ok(_)) => Err(Error::upstream("vector store", e)),
        (Ok(_), Err(e)) => Err(Error::upstream("graph store", e)),
        // Both stores rejected the write for the same reason, e.g. a duplicate id.
        (Err(v), Err(g)) if v.kind() == g.kind() => Err(Error::upstream("vector and graph store", v)),
        (Err(v), Err(g)) => Err(Error::Upstream(format!(
            "vector store: {}; graph store: {}",
            v, g
        ))),
    }
}

fn partial(stored: StoreKind, failed: StoreKind, err: Error) -> Error {
    counter!("ingest_partial_failures_total", 1, "failed" => failed.to_string());
    warn!(%stored, %failed, error = %err, "Partial ingestion");
    Error::PartialIngestion {
        stored: vec![stored],
        failed: vec![(failed, err.to_string())],
    }
}

/// Lower-case the name and replace anything that is not alphanumeric with `_`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        format!("entity_{:016x}", fnv1a(name.as_bytes()))
    } else {
        slug.to_string()
    }
}

/// Map entity names to node ids. A slug already taken in this extraction gets
/// the first free `_2`, `_3`, ... suffix.
fn assign_node_ids(extraction: &Extraction) -> Vec<(String, String)> {
    let mut used: HashSet<String> = HashSet::new();
    extraction
        .entities
        .iter()
        .map(|entity| {
            let base = slugify(&entity.name);
            let mut id = base.clone();
            let mut suffix = 1;
            while used.contains(&id) {
                suffix += 1;
                id = format!("{}_{}", base, suffix);
            }
            used.insert(id.clone());
            (entity.name.clone(), id)
        })
        .collect()
}

fn plan_graph(extraction: &Extraction, document: Option<(&str, &Metadata)>) -> GraphPlan {
    let ids = assign_node_ids(extraction);
    let by_name: HashMap<&str, &str> = ids.iter().map(|(n, id)| (n.as_str(), id.as_str())).collect();

    let mut plan = GraphPlan::default();
    for (entity, (_, id)) in extraction.entities.iter().zip(&ids) {
        let metadata = Metadata::new()
            .with("name", entity.name.clone())
            .with("confidence", entity.confidence);
        plan.entity_nodes
            .push(GraphNode::new(id.clone(), entity.entity_type.clone()).with_metadata(metadata));
    }

    for rel in &extraction.relationships {
        match (by_name.get(rel.source.as_str()), by_name.get(rel.target.as_str())) {
            (Some(source), Some(target)) => plan.edges.push(GraphEdge::new(
                *source,
                *target,
                rel.relationship_type.clone(),
                rel.weight,
            )),
            _ => plan.warnings.push(format!(
                "relationship {} -[{}]-> {} references an entity that was not extracted",
                rel.source, rel.relationship_type, rel.target
            )),
        }
    }

    if let Some((doc_id, metadata)) = document {
        plan.document_node = Some(GraphNode::new(doc_id, DOCUMENT_LABEL).with_metadata(metadata.clone()));
        plan.mention_edges = extraction
            .entities
            .iter()
            .zip(&ids)
            .map(|(entity, (_, id))| GraphEdge::new(doc_id, id.clone(), MENTIONS, entity.confidence))
            .collect();
    }

    plan
}
