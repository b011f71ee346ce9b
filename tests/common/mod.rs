//! Shared test-support helpers (§4.E Correctness Oracle), in the same spirit
//! as the teacher's own `tests/common` builders: hand-assembled in-memory
//! fixtures rather than a real process group.

use topo_collectives::algorithms::{allgather,allreduce,broadcast,reduce};
use topo_collectives::model::{NetworkCharacteristics,TopologyConfig};
use topo_collectives::optimizer::CollectiveOptimizer;
use topo_collectives::reduction::ReductionOp;
use topo_collectives::substrate::{MockSubstrate,Switch};

use std::thread;

///Drive `n` simulated ranks concurrently, one OS thread per rank, collecting
///each rank's return value in rank order. Mirrors the teacher's
///single-process `Simulation::run` in spirit: every rank lives in the same
///test process, but here as a real thread rather than a round-robin loop,
///since `MockSubstrate::recv` blocks.
pub fn run_ranks<F,T>(n: usize, f: F) -> Vec<T>
where F: Fn(usize, MockSubstrate) -> T + Sync, T: Send
{
	let _ = env_logger::builder().is_test(true).try_init();
	let handles = Switch::new(n);
	thread::scope(|scope|
	{
		let threads: Vec<_> = handles.into_iter().enumerate().map(|(rank,substrate)|
		{
			let f = &f;
			scope.spawn(move || f(rank, substrate))
		}).collect();
		threads.into_iter().map(|t| t.join().unwrap()).collect()
	})
}

pub fn sequential_data(count: usize, offset: f64) -> Vec<f64>
{
	(0..count).map(|i| offset + i as f64).collect()
}

///Runs a broadcast through the [`CollectiveOptimizer`] on one independent
///[`Switch`], and the substrate-native binomial tree broadcast on another,
///then asserts the two are bit-exact, per §4.E: "elementwise comparison ...
///or exact match (broadcast) must hold."
pub fn assert_broadcast_oracle(topology: TopologyConfig, n: usize, root: usize, data: &[f64])
{
	let optimized = run_ranks(n, |rank,substrate|
	{
		let model = NetworkCharacteristics::new(topology.clone()).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = if rank == root { data.to_vec() } else { vec![f64::NAN; data.len()] };
		optimizer.optimize_broadcast(&substrate, &mut buf, root).unwrap();
		buf
	});
	let native = run_ranks(n, |rank,substrate|
	{
		let mut buf = if rank == root { data.to_vec() } else { vec![f64::NAN; data.len()] };
		broadcast::binomial_tree_broadcast(&substrate, &mut buf, root).unwrap();
		buf
	});
	for (o,nat) in optimized.iter().zip(native.iter())
	{
		assert_eq!(o, nat, "optimized and native broadcast diverged");
		assert_eq!(o, data, "broadcast did not reproduce root's pre-call buffer");
	}
}

///Runs an allreduce through the optimizer and through a direct ring
///allreduce on independent switches, asserting elementwise agreement within
///`1e-9`, per §4.E's numeric tolerance.
pub fn assert_allreduce_oracle(topology: TopologyConfig, n: usize, op: ReductionOp, per_rank: impl Fn(usize) -> Vec<f64>)
{
	let optimized = run_ranks(n, |rank,substrate|
	{
		let model = NetworkCharacteristics::new(topology.clone()).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = per_rank(rank);
		optimizer.optimize_allreduce(&substrate, &mut buf, op).unwrap();
		buf
	});
	let native = run_ranks(n, |rank,substrate|
	{
		let model = NetworkCharacteristics::new(topology.clone()).unwrap();
		let mut buf = per_rank(rank);
		allreduce::ring_allreduce(&substrate, &mut buf, op, &model).unwrap();
		buf
	});
	for (o,nat) in optimized.iter().zip(native.iter())
	{
		for (a,b) in o.iter().zip(nat.iter())
		{
			assert!((a-b).abs() < 1e-9, "optimized {:?} vs native {:?} diverged beyond tolerance", o, nat);
		}
	}
}

pub fn run_reduce_via(topology: TopologyConfig, n: usize, root: usize, op: ReductionOp, per_rank: impl Fn(usize) -> Vec<f64>) -> Vec<f64>
{
	run_ranks(n, |rank,substrate|
	{
		let model = NetworkCharacteristics::new(topology.clone()).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = per_rank(rank);
		optimizer.optimize_reduce(&substrate, &mut buf, root, op).unwrap();
		(rank,buf)
	}).into_iter().find(|(rank,_)| *rank == root).unwrap().1
}

pub fn run_allgather_via(topology: TopologyConfig, n: usize, chunk_len: usize, per_rank: impl Fn(usize) -> Vec<f64>) -> Vec<Vec<f64>>
{
	run_ranks(n, |rank,substrate|
	{
		let model = NetworkCharacteristics::new(topology.clone()).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = vec![0.0; chunk_len * n];
		let own = per_rank(rank);
		buf[rank*chunk_len..(rank+1)*chunk_len].copy_from_slice(&own);
		optimizer.optimize_allgather(&substrate, &mut buf, chunk_len).unwrap();
		buf
	})
}

pub fn native_allgather_ring(n: usize, chunk_len: usize, per_rank: impl Fn(usize) -> Vec<f64>) -> Vec<Vec<f64>>
{
	run_ranks(n, |rank,substrate|
	{
		let ring: Vec<usize> = (0..n).collect();
		let bounds = topo_collectives::algorithms::chunk_bounds(chunk_len * n, n);
		let mut buf = vec![0.0; chunk_len * n];
		let own = per_rank(rank);
		buf[rank*chunk_len..(rank+1)*chunk_len].copy_from_slice(&own);
		allgather::ring_allgather(&substrate, &mut buf, &bounds, &ring).unwrap();
		buf
	})
}

pub fn native_reduce_binomial(n: usize, root: usize, op: ReductionOp, per_rank: impl Fn(usize) -> Vec<f64>) -> Vec<f64>
{
	run_ranks(n, |rank,substrate|
	{
		let mut buf = per_rank(rank);
		reduce::binomial_tree_reduce(&substrate, &mut buf, root, op).unwrap();
		(rank,buf)
	}).into_iter().find(|(rank,_)| *rank == root).unwrap().1
}
