//! Dependency resolution for service startup ordering.
//!
//! Builds a graph from `depends_on` edges, validates it (no dangling
//! references, no cycles), and produces both a total start order and the
//! parallel start "waves" the lifecycle controller schedules.

use crate::error::{Result, SkiffError};
use crate::types::ServiceSpec;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, instrument};

/// Validated dependency graph over a stack's services.
#[derive(Debug)]
pub struct DependencyGraph {
    /// service -> services that depend on it
    dependents: BTreeMap<String, Vec<String>>,
    /// service -> number of unmet dependencies
    in_degree: BTreeMap<String, usize>,
}

impl DependencyGraph {
    /// Build and validate the graph.
    ///
    /// # Errors
    ///
    /// - `MissingDependency` when a `depends_on` entry names no service
    /// - `Cycle` when the graph is cyclic, naming the cycle members
    #[instrument(skip(services), fields(count = services.len()))]
    pub fn build(services: &[ServiceSpec]) -> Result<Self> {
        let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut in_degree: BTreeMap<String, usize> = BTreeMap::new();

        for service in services {
            dependents.entry(service.name.clone()).or_default();
            in_degree.entry(service.name.clone()).or_insert(0);
        }

        for service in services {
            for dep in &service.depends_on {
                if !in_degree.contains_key(dep) {
                    return Err(SkiffError::MissingDependency {
                        service: service.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependents.get_mut(dep).unwrap().push(service.name.clone());
                *in_degree.get_mut(&service.name).unwrap() += 1;
            }
        }

        let graph = Self { dependents, in_degree };
        graph.check_cycles(services)?;
        Ok(graph)
    }

    /// Total start order: every service appears after all its dependencies.
    /// Ties within a wave break lexicographically, so the order is
    /// deterministic.
    pub fn order(&self) -> Vec<String> {
        self.waves().into_iter().flatten().collect()
    }

    /// Parallel start batches: services within a wave have no ordering
    /// constraint between them; wave N+1 only starts once wave N is running.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let mut in_degree = self.in_degree.clone();
        let mut waves = Vec::new();

        loop {
            // BTreeMap iteration keeps each wave sorted by name.
            let ready: Vec<String> = in_degree
                .iter()
                .filter(|(_, &deg)| deg == 0)
                .map(|(name, _)| name.clone())
                .collect();

            if ready.is_empty() {
                break;
            }

            for name in &ready {
                in_degree.remove(name);
                for dependent in &self.dependents[name] {
                    if let Some(deg) = in_degree.get_mut(dependent) {
                        *deg -= 1;
                    }
                }
            }

            debug!(wave = waves.len(), services = ?ready, "Resolved start wave");
            waves.push(ready);
        }

        waves
    }

    /// Cycle detection via DFS, reporting the members of the first cycle
    /// found as the path from the repeated node back to itself.
    fn check_cycles(&self, services: &[ServiceSpec]) -> Result<()> {
        let edges: HashMap<&str, Vec<&str>> = services
            .iter()
            .map(|s| (s.name.as_str(), s.depends_on.iter().map(String::as_str).collect()))
            .collect();

        let mut visited: HashSet<&str> = HashSet::new();

        for service in services {
            let mut path: Vec<&str> = Vec::new();
            if let Some(cycle) = Self::find_cycle(&edges, &service.name, &mut visited, &mut path) {
                return Err(SkiffError::Cycle { members: cycle });
            }
        }

        Ok(())
    }

    fn find_cycle<'a>(
        edges: &HashMap<&'a str, Vec<&'a str>>,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = path.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }

        if visited.contains(node) {
            return None;
        }
        visited.insert(node);

        path.push(node);
        if let Some(deps) = edges.get(node) {
            for dep in deps {
                if let Some(cycle) = Self::find_cycle(edges, dep, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ServiceSource, ServiceSpec};
    use std::collections::HashMap;

    fn service(name: &str, depends_on: &[&str]) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            source: ServiceSource::Image(format!("{}:latest", name)),
            environment: HashMap::new(),
            ports: vec![],
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            networks: vec![],
            volumes: vec![],
        }
    }

    #[test]
    fn test_order_simple() {
        let services = [service("web", &["db"]), service("db", &[])];
        let graph = DependencyGraph::build(&services).unwrap();
        assert_eq!(graph.order(), vec!["db".to_string(), "web".to_string()]);
    }

    #[test]
    fn test_order_diamond() {
        let services = [
            service("web", &["api", "cache"]),
            service("api", &["db"]),
            service("cache", &[]),
            service("db", &[]),
        ];
        let graph = DependencyGraph::build(&services).unwrap();
        let order = graph.order();

        let idx = |name: &str| order.iter().position(|s| s == name).unwrap();
        assert!(idx("db") < idx("api"));
        assert!(idx("api") < idx("web"));
        assert!(idx("cache") < idx("web"));
    }

    #[test]
    fn test_waves_group_independent_services() {
        let services = [
            service("web", &["api", "cache"]),
            service("api", &["db"]),
            service("cache", &[]),
            service("db", &[]),
        ];
        let graph = DependencyGraph::build(&services).unwrap();
        let waves = graph.waves();

        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["cache".to_string(), "db".to_string()]);
        assert_eq!(waves[1], vec!["api".to_string()]);
        assert_eq!(waves[2], vec!["web".to_string()]);
    }

    #[test]
    fn test_cycle_names_members() {
        let services =
            [service("a", &["b"]), service("b", &["c"]), service("c", &["a"])];
        let err = DependencyGraph::build(&services).unwrap_err();
        match err {
            SkiffError::Cycle { members } => {
                assert_eq!(members.len(), 4);
                assert_eq!(members.first(), members.last());
                for name in ["a", "b", "c"] {
                    assert!(members.contains(&name.to_string()));
                }
            }
            other => panic!("expected Cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let services = [service("a", &["a"])];
        let err = DependencyGraph::build(&services).unwrap_err();
        assert!(matches!(err, SkiffError::Cycle { .. }));
    }

    #[test]
    fn test_missing_dependency() {
        let services = [service("web", &["ghost"])];
        let err = DependencyGraph::build(&services).unwrap_err();
        match err {
            SkiffError::MissingDependency { service, dependency } => {
                assert_eq!(service, "web");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected MissingDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_order_is_deterministic() {
        let services = [service("b", &[]), service("a", &[]), service("c", &[])];
        let graph = DependencyGraph::build(&services).unwrap();
        assert_eq!(
            graph.order(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
