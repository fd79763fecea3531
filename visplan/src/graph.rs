use cid::Cid;
use indexmap::IndexMap;
use multihash::MultihashGeneric;
use multihash_codetable::Sha2_256;
use multihash_derive::Hasher;
use unsigned_varint::encode::{u64 as varint_encode_u64, u64_buffer as varint_u64_buffer};

use crate::dtype::ArrayData;

const SHA2_256: u64 = 0x12;

/// Incrementally hashes task descriptions into a `Cid`.
///
/// Two tasks with the same operation, the same input values and the same
/// slice provenance hash to the same cid, no matter when or where the graph
/// was assembled.
///
pub(crate) struct ContentHasher {
    hash: Sha2_256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            hash: Sha2_256::default(),
        }
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hash.update(bytes);
    }

    pub fn update_usize(&mut self, value: usize) {
        let mut buffer = varint_u64_buffer();
        self.hash.update(varint_encode_u64(value as u64, &mut buffer));
    }

    pub fn update_array(&mut self, data: &ArrayData) {
        self.update_bytes(&data.stable_bytes());
    }

    pub fn finish(mut self) -> Cid {
        let digest = self.hash.finalize();
        let hash = MultihashGeneric::wrap(SHA2_256, digest)
            .expect("a sha2-256 digest fits in a 64 byte multihash");

        Cid::new_v1(SHA2_256, hash)
    }
}

/// The operation a task performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOp {
    AntennaUvw { nr_of_antenna: usize },
}

impl TaskOp {
    fn tag(&self) -> u8 {
        match self {
            TaskOp::AntennaUvw { .. } => 1,
        }
    }

    fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.update_bytes(&[self.tag()]);
        match self {
            TaskOp::AntennaUvw { nr_of_antenna } => {
                hasher.update_usize(*nr_of_antenna);
            }
        }
    }
}

/// One ordered argument to a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskInput {
    /// The output of another task in the graph.
    Node(Cid),

    /// A value captured at graph build time.
    Literal(ArrayData),
}

impl TaskInput {
    fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            TaskInput::Node(cid) => {
                hasher.update_bytes(&[0]);
                hasher.update_bytes(&cid.to_bytes());
            }
            TaskInput::Literal(data) => {
                hasher.update_bytes(&[1]);
                hasher.update_array(data);
            }
        }
    }
}

/// A single content-addressed task.
///
/// `bounds` records the slice offsets the literal inputs were cut at. They
/// participate in the identity hash so that two groups with coincidentally
/// equal values at different offsets stay distinct tasks.
///
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub cid: Cid,
    pub op: TaskOp,
    pub inputs: Vec<TaskInput>,
    pub bounds: Vec<usize>,
}

impl TaskNode {
    pub fn new(op: TaskOp, inputs: Vec<TaskInput>, bounds: Vec<usize>) -> Self {
        let mut hasher = ContentHasher::new();
        op.hash_into(&mut hasher);
        hasher.update_usize(bounds.len());
        for bound in &bounds {
            hasher.update_usize(*bound);
        }
        hasher.update_usize(inputs.len());
        for input in &inputs {
            input.hash_into(&mut hasher);
        }
        let cid = hasher.finish();

        Self {
            cid,
            op,
            inputs,
            bounds,
        }
    }
}

/// A DAG of tasks keyed by cid, with designated ordered roots.
///
/// Adding a node whose cid is already present is a no-op, so identical work
/// dedups within and across builder passes.
///
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: IndexMap<Cid, TaskNode>,
    roots: Vec<Cid>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: TaskNode) -> Cid {
        let cid = node.cid;
        self.nodes.entry(cid).or_insert(node);

        cid
    }

    pub fn add_root(&mut self, node: TaskNode) -> Cid {
        let cid = self.add(node);
        self.roots.push(cid);

        cid
    }

    pub fn get(&self, cid: &Cid) -> Option<&TaskNode> {
        self.nodes.get(cid)
    }

    pub fn roots(&self) -> &[Cid] {
        &self.roots
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::arr1;

    fn uvw_node(values: &[f64], bounds: Vec<usize>) -> TaskNode {
        let data = ArrayData::from(arr1(values).into_dyn());
        TaskNode::new(
            TaskOp::AntennaUvw { nr_of_antenna: 3 },
            vec![TaskInput::Literal(data)],
            bounds,
        )
    }

    #[test]
    fn test_identical_tasks_share_a_cid() {
        let a = uvw_node(&[1.0, 2.0], vec![0, 2]);
        let b = uvw_node(&[1.0, 2.0], vec![0, 2]);
        assert_eq!(a.cid, b.cid);
    }

    #[test]
    fn test_inputs_change_the_cid() {
        let a = uvw_node(&[1.0, 2.0], vec![0, 2]);
        let b = uvw_node(&[1.0, 3.0], vec![0, 2]);
        assert_ne!(a.cid, b.cid);
    }

    #[test]
    fn test_bounds_change_the_cid() {
        let a = uvw_node(&[1.0, 2.0], vec![0, 2]);
        let b = uvw_node(&[1.0, 2.0], vec![2, 4]);
        assert_ne!(a.cid, b.cid);
    }

    #[test]
    fn test_add_dedups() {
        let mut graph = TaskGraph::new();
        let first = graph.add_root(uvw_node(&[1.0, 2.0], vec![0, 2]));
        let second = graph.add_root(uvw_node(&[1.0, 2.0], vec![0, 2]));

        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.roots().len(), 2);
    }

    #[test]
    fn test_node_and_literal_inputs_differ() {
        let inner = uvw_node(&[1.0, 2.0], vec![0, 2]);
        let via_node = TaskNode::new(
            TaskOp::AntennaUvw { nr_of_antenna: 3 },
            vec![TaskInput::Node(inner.cid)],
            vec![],
        );
        let via_literal = TaskNode::new(
            TaskOp::AntennaUvw { nr_of_antenna: 3 },
            vec![TaskInput::Literal(ArrayData::from(
                arr1(&inner.cid.to_bytes().iter().map(|b| *b as f64).collect::<Vec<_>>())
                    .into_dyn(),
            ))],
            vec![],
        );
        assert_ne!(via_node.cid, via_literal.cid);
    }
}
