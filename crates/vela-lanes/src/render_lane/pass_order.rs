// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Linear submission order for a pass-set's render passes.

use std::collections::HashMap;
use thiserror::Error;
use vela_core::graph::topological_sort;
use vela_core::shaderpack::RenderPassCreateInfo;

/// Errors that make a set of passes impossible to order. Both abort the load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassOrderError {
    /// The dependency graph contains a cycle.
    #[error("render pass dependency cycle among {0:?}")]
    Cycle(Vec<String>),
    /// Two passes share a name, so dependencies on it are ambiguous.
    #[error("render pass '{0}' is declared more than once")]
    DuplicatePass(String),
}

/// Orders `passes` so that every pass comes after all of its dependencies.
///
/// Passes with no ordering constraint between them keep their declaration order.
/// Dependencies on passes that were not declared are ignored with a warning.
///
/// # Returns
///
/// * `Ok(Vec<&RenderPassCreateInfo>)`: The passes in submission order.
/// * `Err(PassOrderError)`: If names collide or the dependencies form a cycle.
pub fn order_passes(
    passes: &[RenderPassCreateInfo],
) -> Result<Vec<&RenderPassCreateInfo>, PassOrderError> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::with_capacity(passes.len());
    for (index, pass) in passes.iter().enumerate() {
        if index_by_name.insert(pass.name.as_str(), index).is_some() {
            return Err(PassOrderError::DuplicatePass(pass.name.clone()));
        }
    }

    let mut edges = Vec::new();
    for (index, pass) in passes.iter().enumerate() {
        for dependency in &pass.dependencies {
            match index_by_name.get(dependency.as_str()) {
                Some(&dependency_index) => edges.push((dependency_index, index)),
                None => log::warn!(
                    "Render pass '{}' depends on undeclared pass '{}'; ignoring the dependency",
                    pass.name,
                    dependency
                ),
            }
        }
    }

    let order = topological_sort(0..passes.len(), edges).map_err(|cycle| {
        PassOrderError::Cycle(
            cycle
                .unresolved
                .into_iter()
                .map(|index| passes[index].name.clone())
                .collect(),
        )
    })?;

    Ok(order.into_iter().map(|index| &passes[index]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(name: &str, dependencies: &[&str]) -> RenderPassCreateInfo {
        RenderPassCreateInfo {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn names(order: Vec<&RenderPassCreateInfo>) -> Vec<&str> {
        order.into_iter().map(|pass| pass.name.as_str()).collect()
    }

    #[test]
    fn chain_with_shortcut_orders_a_b_c() {
        let passes = vec![pass("C", &["A", "B"]), pass("B", &["A"]), pass("A", &[])];
        assert_eq!(names(order_passes(&passes).unwrap()), vec!["A", "B", "C"]);
    }

    #[test]
    fn unrelated_passes_keep_declaration_order() {
        let passes = vec![
            pass("Shadows", &[]),
            pass("Gbuffer", &[]),
            pass("Lighting", &["Gbuffer", "Shadows"]),
            pass("Debug", &[]),
        ];
        assert_eq!(
            names(order_passes(&passes).unwrap()),
            vec!["Shadows", "Gbuffer", "Debug", "Lighting"]
        );
    }

    #[test]
    fn every_dependency_precedes_its_dependant() {
        let passes = vec![
            pass("Post", &["Lighting", "Particles"]),
            pass("Particles", &["Gbuffer"]),
            pass("Lighting", &["Gbuffer", "Shadows"]),
            pass("Gbuffer", &[]),
            pass("Shadows", &[]),
            pass("Final", &["Post"]),
        ];
        let order = names(order_passes(&passes).unwrap());
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
        for declared in &passes {
            for dependency in &declared.dependencies {
                assert!(position(dependency) < position(&declared.name));
            }
        }
    }

    #[test]
    fn cycles_are_rejected() {
        let passes = vec![pass("A", &["C"]), pass("B", &["A"]), pass("C", &["B"]), pass("D", &[])];
        let err = order_passes(&passes).unwrap_err();
        assert_eq!(
            err,
            PassOrderError::Cycle(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let passes = vec![pass("A", &[]), pass("A", &[])];
        assert_eq!(
            order_passes(&passes).unwrap_err(),
            PassOrderError::DuplicatePass("A".to_string())
        );
    }

    #[test]
    fn undeclared_dependencies_are_ignored() {
        let passes = vec![pass("B", &["Missing"]), pass("A", &[])];
        assert_eq!(names(order_passes(&passes).unwrap()), vec!["B", "A"]);
    }
}
