//! Utility functions for the container
//!
//! Naming helpers for generated component names and static analysis of the
//! construction dependency graph.

/// Naming convention utilities for component names
pub mod naming {
    use crate::introspect::TypeKey;

    /// Converts a PascalCase type name to camelCase.
    ///
    /// # Examples
    ///
    /// ```
    /// use weave_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("OrderService"), "orderService");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Default component name for a type: its simple name in camelCase.
    ///
    /// `shop.OrderService` becomes `orderService`.
    pub fn generated_component_name(key: &TypeKey) -> String {
        to_camel_case(key.simple_name())
    }
}

/// Dependency graph analysis
pub mod dependency {
    use std::collections::{BTreeMap, BTreeSet};

    use thiserror::Error;

    /// Dependency graph analysis result
    #[derive(Debug, Error, PartialEq)]
    pub enum DependencyValidationError {
        /// Circular dependency detected
        #[error("circular dependency detected: {}", .cycle.join(" -> "))]
        CircularDependency {
            /// The dependency chain forming the cycle
            cycle: Vec<String>,
        },
        /// Missing dependency detected
        #[error("component '{component}' depends on '{missing}' which is not registered")]
        MissingDependency { component: String, missing: String },
    }

    /// Validates a dependency graph for cycles and missing components.
    ///
    /// Components are visited in name order so the reported issue is stable.
    /// Returns the first detected issue.
    pub fn validate_dependency_graph(
        dependencies: &BTreeMap<String, Vec<String>>,
    ) -> Result<(), DependencyValidationError> {
        for (component, deps) in dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(DependencyValidationError::MissingDependency {
                        component: component.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();

        for component in dependencies.keys() {
            if !visited.contains(component) {
                if let Some(cycle) =
                    detect_cycle_dfs(component, dependencies, &mut visited, &mut stack)
                {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }

        Ok(())
    }

    fn detect_cycle_dfs(
        node: &str,
        graph: &BTreeMap<String, Vec<String>>,
        visited: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(deps) = graph.get(node) {
            for dep in deps {
                if let Some(start) = stack.iter().position(|x| x == dep) {
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep) {
                    if let Some(cycle) = detect_cycle_dfs(dep, graph, visited, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    mod naming_tests {
        use super::super::naming::*;
        use crate::introspect::TypeKey;

        #[test]
        fn test_to_camel_case() {
            assert_eq!(to_camel_case("UserService"), "userService");
            assert_eq!(to_camel_case("AB"), "aB");
            assert_eq!(to_camel_case("lowerCase"), "lowerCase");
        }

        #[test]
        fn test_generated_component_name() {
            assert_eq!(
                generated_component_name(&TypeKey::new("shop.OrderService")),
                "orderService"
            );
            assert_eq!(generated_component_name(&TypeKey::new("Clock")), "clock");
        }
    }

    mod dependency_tests {
        use super::super::dependency::*;
        use std::collections::BTreeMap;

        fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
            edges
                .iter()
                .map(|(name, deps)| {
                    (name.to_string(), deps.iter().map(|d| d.to_string()).collect())
                })
                .collect()
        }

        #[test]
        fn test_validate_missing_dependency() {
            let result = validate_dependency_graph(&graph(&[("serviceA", &["serviceB"])]));
            assert_eq!(
                result,
                Err(DependencyValidationError::MissingDependency {
                    component: "serviceA".to_string(),
                    missing: "serviceB".to_string(),
                })
            );
        }

        #[test]
        fn test_validate_circular_dependency() {
            let result = validate_dependency_graph(&graph(&[
                ("serviceA", &["serviceB"]),
                ("serviceB", &["serviceC"]),
                ("serviceC", &["serviceA"]),
            ]));
            match result {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle, vec!["serviceA", "serviceB", "serviceC", "serviceA"]);
                }
                other => panic!("expected a cycle, got {:?}", other),
            }
        }

        #[test]
        fn test_validate_valid_graph() {
            let result = validate_dependency_graph(&graph(&[
                ("config", &[]),
                ("database", &["config"]),
                ("userService", &["database", "config"]),
            ]));
            assert!(result.is_ok());
        }

        #[test]
        fn test_validate_self_dependency() {
            let result = validate_dependency_graph(&graph(&[("serviceA", &["serviceA"])]));
            match result {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle.len(), 2);
                }
                other => panic!("expected a cycle, got {:?}", other),
            }
        }
    }
}
