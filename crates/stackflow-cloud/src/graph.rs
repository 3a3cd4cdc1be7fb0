//! Dependency graph builder
//!
//! Sorts a [`Topology`] so that every resource comes after the resources it
//! depends on. Independent resources keep their declaration order, which
//! keeps repeated plans diff-friendly.

use crate::error::{CloudError, Result};
use crate::resource::{ResourceId, Topology};
use std::collections::{BTreeSet, HashMap};

/// Topologically sorted view over a topology
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Resource ids in declaration order
    ids: Vec<ResourceId>,
    /// Declaration indices in dependency order
    order: Vec<usize>,
    /// Direct dependencies per declaration index
    dependencies: Vec<Vec<usize>>,
    /// Direct dependents per declaration index
    dependents: Vec<Vec<usize>>,
    index: HashMap<ResourceId, usize>,
}

impl DependencyGraph {
    /// Build and sort the graph; fails on unknown dependencies or cycles
    pub fn build(topology: &Topology) -> Result<Self> {
        let ids: Vec<ResourceId> = topology.iter().map(|r| r.id.clone()).collect();
        let mut index = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i).is_some() {
                return Err(CloudError::DuplicateResource(id.clone()));
            }
        }

        let mut dependencies = vec![Vec::new(); ids.len()];
        let mut dependents = vec![Vec::new(); ids.len()];
        for (i, resource) in topology.iter().enumerate() {
            for dep in &resource.depends_on {
                let Some(&d) = index.get(dep) else {
                    return Err(CloudError::UnknownDependency {
                        resource: resource.id.clone(),
                        missing: dep.clone(),
                    });
                };
                if !dependencies[i].contains(&d) {
                    dependencies[i].push(d);
                    dependents[d].push(i);
                }
            }
        }

        // Kahn's algorithm in waves; each wave is in declaration order
        let mut remaining: Vec<usize> = dependencies.iter().map(Vec::len).collect();
        let mut wave: Vec<usize> = (0..ids.len()).filter(|&i| remaining[i] == 0).collect();
        let mut order = Vec::with_capacity(ids.len());

        while !wave.is_empty() {
            let mut next_wave = Vec::new();
            for &node in &wave {
                for &dependent in &dependents[node] {
                    remaining[dependent] -= 1;
                    if remaining[dependent] == 0 {
                        next_wave.push(dependent);
                    }
                }
            }
            next_wave.sort_unstable();
            order.append(&mut wave);
            wave = next_wave;
        }

        if order.len() != ids.len() {
            let cycle = find_cycle(&dependencies, &remaining)
                .into_iter()
                .map(|i| ids[i].clone())
                .collect();
            return Err(CloudError::CycleDetected { cycle });
        }

        Ok(Self {
            ids,
            order,
            dependencies,
            dependents,
            index,
        })
    }

    /// Resource ids in dependency order
    pub fn sorted(&self) -> Vec<&ResourceId> {
        self.order.iter().map(|&i| &self.ids[i]).collect()
    }

    /// Declaration indices in dependency order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Resource ids in reverse dependency order (for teardown)
    pub fn reverse_sorted(&self) -> Vec<&ResourceId> {
        self.order.iter().rev().map(|&i| &self.ids[i]).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, index: usize) -> &ResourceId {
        &self.ids[index]
    }

    pub fn index_of(&self, id: &ResourceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn dependency_indices(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    pub(crate) fn dependent_indices(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    pub fn dependencies(&self, id: &ResourceId) -> Vec<&ResourceId> {
        self.index_of(id)
            .map(|i| self.dependencies[i].iter().map(|&d| &self.ids[d]).collect())
            .unwrap_or_default()
    }

    pub fn dependents(&self, id: &ResourceId) -> Vec<&ResourceId> {
        self.index_of(id)
            .map(|i| self.dependents[i].iter().map(|&d| &self.ids[d]).collect())
            .unwrap_or_default()
    }

    /// Every resource that depends on `id`, directly or not, in dependency order
    pub fn transitive_dependents(&self, id: &ResourceId) -> Vec<&ResourceId> {
        let Some(start) = self.index_of(id) else {
            return Vec::new();
        };
        let reached = self.reach_dependents(start);
        self.order
            .iter()
            .filter(|i| reached.contains(i))
            .map(|&i| &self.ids[i])
            .collect()
    }

    pub(crate) fn reach_dependents(&self, start: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        let mut stack = self.dependents[start].clone();
        while let Some(i) = stack.pop() {
            if reached.insert(i) {
                stack.extend(self.dependents[i].iter().copied());
            }
        }
        reached
    }
}

/// Walk dependency edges among the nodes Kahn could not emit until a node repeats
fn find_cycle(dependencies: &[Vec<usize>], remaining: &[usize]) -> Vec<usize> {
    let Some(start) = (0..remaining.len()).find(|&i| remaining[i] > 0) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        // every stuck node has at least one stuck dependency
        let Some(&next) = dependencies[current].iter().find(|&&d| remaining[d] > 0) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            // report in dependency direction: "a -> b" reads "a depends on b"
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
