//! Grouping of marked elements into component instances.
//!
//! A component renders one or more marked elements. When the same component
//! is used several times on a page, its markers have to be split back into
//! one group per instance using only the shape of the tree.
//!
//! The rule: take the lowest common ancestor `L` of all markers and the
//! branch (child of `L`) each marker sits under.
//!
//! - A marker that is `L` itself holds everything: one instance.
//! - When the branches repeat a shape (the same sequence of tag names and
//!   marker/wrapper roots, at least twice), each repetition is one instance.
//!   This covers wrapped instances (`<li><a/></li>` per item) and markers
//!   that are the instance root (`<li data-cms-id>` per item).
//! - Otherwise, with two or more wrapper branches, every wrapper is its own
//!   instance and each run of markers sitting directly in `L` is another.
//! - Otherwise the markers share `L` as one instance.

/// Parent links over some tree of nodes.
pub trait Tree {
    type Node: Clone + PartialEq;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Tag name or other structural label, used to spot repeated shapes.
    fn label(&self, _node: &Self::Node) -> Option<String> {
        None
    }

    /// `node` followed by its ancestors up to the root.
    fn ancestors(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut chain = vec![node.clone()];
        let mut current = node.clone();
        while let Some(parent) = self.parent(&current) {
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Deepest node that is an ancestor-or-self of every node in `nodes`.
    fn find_lca(&self, nodes: &[Self::Node]) -> Option<Self::Node> {
        let (first, rest) = nodes.split_first()?;
        let others: Vec<Vec<Self::Node>> = rest.iter().map(|n| self.ancestors(n)).collect();
        self.ancestors(first)
            .into_iter()
            .find(|candidate| others.iter().all(|chain| chain.contains(candidate)))
    }
}

/// One component instance: the ids it renders and the node enclosing them.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster<N> {
    pub cluster_entry_ids: Vec<String>,
    pub container_node: N,
}

/// Split marked elements into component instances.
///
/// `elements` and `ids` are parallel and in document order. Ids keep their
/// relative order inside each cluster and clusters come out in document
/// order. Empty input gives no clusters.
pub fn cluster_component_entries<T, I>(
    elements: &[T::Node],
    ids: &[I],
    tree: &T,
) -> Vec<Cluster<T::Node>>
where
    T: Tree,
    I: AsRef<str>,
{
    let pairs: Vec<(&T::Node, &str)> = elements
        .iter()
        .zip(ids.iter().map(AsRef::as_ref))
        .collect();
    let Some((first, _)) = pairs.first() else {
        return Vec::new();
    };

    let all_ids = || pairs.iter().map(|(_, id)| id.to_string()).collect();
    let Some(lca) = tree.find_lca(elements) else {
        // disconnected nodes; nothing structural to go on
        tracing::debug!(markers = pairs.len(), "markers share no ancestor");
        return vec![Cluster {
            cluster_entry_ids: all_ids(),
            container_node: (*first).clone(),
        }];
    };

    let mut branches: Vec<Branch<T::Node>> = Vec::new();
    for (element, id) in &pairs {
        let Some(root) = branch_under(tree, element, &lca) else {
            // the container is itself a marker
            return vec![Cluster {
                cluster_entry_ids: all_ids(),
                container_node: lca,
            }];
        };
        match branches.iter_mut().find(|b| b.root == root) {
            Some(branch) => branch.ids.push(id.to_string()),
            None => branches.push(Branch {
                is_marker: elements.contains(&root),
                label: tree.label(&root),
                root,
                ids: vec![id.to_string()],
            }),
        }
    }

    if let Some(period) = repeat_period(&branches) {
        return chunk(branches, period, &lca);
    }

    let wrappers = branches.iter().filter(|b| !b.is_marker).count();
    if wrappers < 2 {
        return vec![Cluster {
            cluster_entry_ids: all_ids(),
            container_node: lca,
        }];
    }

    let mut clusters: Vec<Cluster<T::Node>> = Vec::new();
    let mut in_marker_run = false;
    for branch in branches {
        let extends_run = branch.is_marker && in_marker_run;
        in_marker_run = branch.is_marker;
        match clusters.last_mut().filter(|_| extends_run) {
            Some(run) => {
                run.cluster_entry_ids.extend(branch.ids);
                run.container_node = lca.clone();
            }
            None => clusters.push(Cluster {
                cluster_entry_ids: branch.ids,
                container_node: branch.root,
            }),
        }
    }
    clusters
}

struct Branch<N> {
    root: N,
    is_marker: bool,
    label: Option<String>,
    ids: Vec<String>,
}

impl<N> Branch<N> {
    fn same_shape(&self, other: &Self) -> bool {
        self.is_marker == other.is_marker && self.label == other.label
    }
}

/// Smallest number of branches whose shape repeats across all of them, at
/// least twice.
fn repeat_period<N>(branches: &[Branch<N>]) -> Option<usize> {
    let n = branches.len();
    (1..=n / 2).filter(|p| n % p == 0).find(|&p| {
        branches
            .iter()
            .zip(branches.iter().skip(p))
            .all(|(a, b)| a.same_shape(b))
    })
}

fn chunk<N: Clone>(branches: Vec<Branch<N>>, period: usize, lca: &N) -> Vec<Cluster<N>> {
    let mut clusters = Vec::new();
    let mut branches = branches.into_iter().peekable();
    while branches.peek().is_some() {
        let group: Vec<Branch<N>> = branches.by_ref().take(period).collect();
        let container_node = match group.as_slice() {
            [single] => single.root.clone(),
            _ => lca.clone(),
        };
        clusters.push(Cluster {
            cluster_entry_ids: group.into_iter().flat_map(|b| b.ids).collect(),
            container_node,
        });
    }
    clusters
}

/// Child of `ancestor` on the path to `node`, `None` when they are the same.
fn branch_under<T: Tree>(tree: &T, node: &T::Node, ancestor: &T::Node) -> Option<T::Node> {
    let mut current = node.clone();
    loop {
        if current == *ancestor {
            return None;
        }
        let parent = tree.parent(&current)?;
        if parent == *ancestor {
            return Some(current);
        }
        current = parent;
    }
}
