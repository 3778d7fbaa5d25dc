//! Bounded breadth-first expansion shared by graph backends.

use std::collections::{HashSet, VecDeque};

/// Restricts which relationship types a traversal may follow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipFilter {
    allowed: Option<HashSet<String>>,
}

impl RelationshipFilter {
    /// Follow every relationship type
    pub fn all() -> Self {
        Self { allowed: None }
    }

    /// `None` or an empty list both mean "all types"
    pub fn new(types: Option<&[String]>) -> Self {
        let allowed = types
            .map(|t| {
                t.iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<HashSet<_>>()
            })
            .filter(|set| !set.is_empty());
        Self { allowed }
    }

    /// Parse a comma separated list such as `USES,MENTIONS`
    pub fn parse(list: &str) -> Self {
        let types: Vec<String> = list.split(',').map(str::to_string).collect();
        Self::new(Some(&types))
    }

    pub fn allows(&self, relationship_type: &str) -> bool {
        match &self.allowed {
            Some(set) => set.contains(relationship_type),
            None => true,
        }
    }

    pub fn is_all(&self) -> bool {
        self.allowed.is_none()
    }

    /// Allowed types in sorted order, `None` for "all"
    pub fn types(&self) -> Option<Vec<String>> {
        self.allowed.as_ref().map(|set| {
            let mut types: Vec<String> = set.iter().cloned().collect();
            types.sort();
            types
        })
    }
}

/// Nodes reached by an expansion, in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    /// (node id, hop distance) pairs; the start node is not included
    pub reached: Vec<(String, usize)>,
    /// Set when the visited-node ceiling stopped the expansion early
    pub truncated: bool,
}

/// Breadth-first expansion from `start`.
///
/// `next` yields the successors of a node in a deterministic order. Nodes are
/// visited at most once, depth never exceeds `max_depth`, and at most
/// `max_visited` nodes (start included) are visited.
pub fn expand<F>(start: &str, max_depth: usize, max_visited: usize, mut next: F) -> Expansion
where
    F: FnMut(&str) -> Vec<String>,
{
    let mut expansion = Expansion::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();

    visited.insert(start.to_string());
    queue.push_back((start.to_string(), 0));

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for successor in next(&node) {
            if visited.contains(&successor) {
                continue;
            }
            if visited.len() >= max_visited {
                expansion.truncated = true;
                return expansion;
            }
            visited.insert(successor.clone());
            expansion.reached.push((successor.clone(), depth + 1));
            queue.push_back((successor, depth + 1));
        }
    }

    expansion
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn chain() -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([
            ("a", vec!["b", "c"]),
            ("b", vec!["d", "a"]),
            ("c", vec!["d"]),
            ("d", vec!["e"]),
        ])
    }

    fn successors<'a>(graph: &'a HashMap<&'static str, Vec<&'static str>>) -> impl FnMut(&str) -> Vec<String> + 'a {
        move |id| {
            graph
                .get(id)
                .map(|n| n.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_expand_respects_depth_and_visits_once() {
        let graph = chain();
        let expansion = expand("a", 2, 100, successors(&graph));
        assert_eq!(
            expansion.reached,
            vec![("b".to_string(), 1), ("c".to_string(), 1), ("d".to_string(), 2)]
        );
        assert!(!expansion.truncated);
    }

    #[test]
    fn test_expand_stops_at_visited_ceiling() {
        let graph = chain();
        let expansion = expand("a", 10, 3, successors(&graph));
        assert_eq!(expansion.reached.len(), 2);
        assert!(expansion.truncated);
    }

    #[test]
    fn test_relationship_filter() {
        let filter = RelationshipFilter::parse("USES, MENTIONS,");
        assert!(filter.allows("USES"));
        assert!(filter.allows("MENTIONS"));
        assert!(!filter.allows("RELATED"));

        assert!(RelationshipFilter::parse("").is_all());
        assert!(RelationshipFilter::new(None).allows("ANYTHING"));
        assert_eq!(filter.types(), Some(vec!["MENTIONS".to_string(), "USES".to_string()]));
    }
}
