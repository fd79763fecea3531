use std::collections::HashMap;
use std::sync::Arc;

use async_recursion::async_recursion;
use async_trait::async_trait;
use cid::Cid;
use ndarray::{Array2, ArrayView1, ArrayView2, Ix1, Ix2};
use parking_lot::Mutex;

use crate::{
    dtype::ArrayData,
    errors::{Error, Result},
    graph::{TaskGraph, TaskInput, TaskNode, TaskOp},
};

/// Where deferred arrays get evaluated.
///
/// `submit` hands over a graph; `materialize` produces the output of one of
/// its tasks. Implementations are free to schedule, distribute and cache
/// however they like, as long as identical cids produce identical values.
///
#[async_trait]
pub trait Runtime: Send + Sync {
    async fn submit(&self, graph: Arc<TaskGraph>) -> Result<()>;

    async fn materialize(&self, cid: &Cid) -> Result<ArrayData>;
}

/// The pure numeric kernel computing per-antenna coordinates for one chunk
/// group: (rows, 3) baseline coordinates, the paired antenna indices, and the
/// rows per timestep, producing one (nr_of_antenna, 3) slab.
///
pub trait UvwKernel: Send + Sync {
    fn antenna_uvw(
        &self,
        uvw: ArrayView2<f64>,
        antenna2: ArrayView1<i32>,
        antenna1: ArrayView1<i32>,
        time_vrow_chunks: ArrayView1<i32>,
        nr_of_antenna: usize,
    ) -> Result<Array2<f64>>;
}

/// In-process reference runtime.
///
/// Results memoize by cid, so a task shared between graphs, or between
/// repeated builds of the same graph, runs its kernel exactly once.
///
pub struct LocalRuntime {
    kernel: Arc<dyn UvwKernel>,
    graphs: Mutex<HashMap<Cid, Arc<TaskGraph>>>,
    results: Mutex<HashMap<Cid, ArrayData>>,
}

impl LocalRuntime {
    pub fn new(kernel: Arc<dyn UvwKernel>) -> Self {
        Self {
            kernel,
            graphs: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
        }
    }

    #[async_recursion]
    async fn execute(&self, node: &TaskNode, graph: &TaskGraph) -> Result<ArrayData> {
        if let Some(found) = self.results.lock().get(&node.cid) {
            return Ok(found.clone());
        }

        let mut inputs = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            match input {
                TaskInput::Literal(data) => inputs.push(data.clone()),
                TaskInput::Node(cid) => {
                    let dependency = graph.get(cid).ok_or(Error::NotFound(*cid))?;
                    inputs.push(self.execute(dependency, graph).await?);
                }
            }
        }

        let result = self.run(node, &inputs)?;
        self.results.lock().insert(node.cid, result.clone());

        Ok(result)
    }

    fn run(&self, node: &TaskNode, inputs: &[ArrayData]) -> Result<ArrayData> {
        match node.op {
            TaskOp::AntennaUvw { nr_of_antenna } => {
                if inputs.len() != 4 {
                    return Err(Error::Configuration(format!(
                        "antenna uvw task takes 4 inputs, got {}",
                        inputs.len()
                    )));
                }
                let uvw = f64_matrix(&inputs[0], "uvw")?;
                let antenna2 = i32_vector(&inputs[1], "antenna2")?;
                let antenna1 = i32_vector(&inputs[2], "antenna1")?;
                let chunks = i32_vector(&inputs[3], "time_vrow_chunks")?;

                let slab = self
                    .kernel
                    .antenna_uvw(uvw, antenna2, antenna1, chunks, nr_of_antenna)?;
                if slab.shape() != [nr_of_antenna, 3] {
                    return Err(Error::Configuration(format!(
                        "kernel produced shape {:?}, expected [{}, 3]",
                        slab.shape(),
                        nr_of_antenna
                    )));
                }

                Ok(ArrayData::from(slab.into_dyn()))
            }
        }
    }
}

#[async_trait]
impl Runtime for LocalRuntime {
    async fn submit(&self, graph: Arc<TaskGraph>) -> Result<()> {
        let mut graphs = self.graphs.lock();
        for node in graph.nodes() {
            graphs.insert(node.cid, Arc::clone(&graph));
        }

        Ok(())
    }

    async fn materialize(&self, cid: &Cid) -> Result<ArrayData> {
        let graph = self
            .graphs
            .lock()
            .get(cid)
            .cloned()
            .ok_or(Error::NotFound(*cid))?;
        let node = graph.get(cid).ok_or(Error::NotFound(*cid))?.clone();

        self.execute(&node, &graph).await
    }
}

fn f64_matrix<'a>(data: &'a ArrayData, name: &str) -> Result<ArrayView2<'a, f64>> {
    data.as_f64()
        .ok_or_else(|| Error::Configuration(format!("'{name}' input does not hold f64 values")))?
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| Error::Configuration(format!("'{name}' input is not two dimensional")))
}

fn i32_vector<'a>(data: &'a ArrayData, name: &str) -> Result<ArrayView1<'a, i32>> {
    data.as_i32()
        .ok_or_else(|| Error::Configuration(format!("'{name}' input does not hold i32 values")))?
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|_| Error::Configuration(format!("'{name}' input is not one dimensional")))
}
