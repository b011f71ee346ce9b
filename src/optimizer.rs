/*!

The Collective Optimizer (§4.D): the single decision surface every
`optimize_*` entry point goes through. Each call runs the state machine
`DECIDE -> DISPATCH -> EXECUTE -> REPORT`: decide an [`AlgorithmChoice`] from
the [`CallDescriptor`] and the model (consulting/populating the decision
cache), dispatch to the matching [`crate::algorithms`] function, execute it
against the caller's [`Substrate`], then log and optionally persist a
[`crate::report::PerformanceReport`] row.

*/

use std::sync::Mutex;

use crate::algorithms::{self,is_power_of_two,pipeline_segment_count};
use crate::descriptor::{CallDescriptor,OpKind};
use crate::error::{Error,Result};
use crate::lru_cache::LruCache;
use crate::model::NetworkCharacteristics;
use crate::reduction::ReductionOp;
use crate::report::PerformanceReport;
use crate::substrate::Substrate;

///Decision-cache capacity (§4.D, §9: "bounded LRU ... e.g. 256 entries").
const DECISION_CACHE_CAPACITY: usize = 256;

///The byte count at which the fat-tree measurement defaults (α=1.0us,
///β=8/40000 us/byte) place the documented `T_small` default of 4 KiB. Other
///topologies' thresholds scale from their own α/β against this reference
///ratio, per §4.D: "thresholds are model-parameterized ... so the algorithm
///crossover follows measured α/β."
const REFERENCE_ALPHA_OVER_BETA_BYTES: f64 = 5000.0;
const DEFAULT_T_SMALL_BYTES: f64 = 4096.0;
const DEFAULT_T_LARGE_BYTES: f64 = 262_144.0;

fn t_small_bytes(model: &NetworkCharacteristics) -> usize
{
	let ratio = model.alpha_us() / model.beta_us_per_byte();
	((DEFAULT_T_SMALL_BYTES * ratio / REFERENCE_ALPHA_OVER_BETA_BYTES).round().max(1.0)) as usize
}

fn t_large_bytes(model: &NetworkCharacteristics) -> usize
{
	let ratio = model.alpha_us() / model.beta_us_per_byte();
	let small = t_small_bytes(model);
	((DEFAULT_T_LARGE_BYTES * ratio / REFERENCE_ALPHA_OVER_BETA_BYTES).round().max(small as f64)) as usize
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum BroadcastAlgorithm
{
	BinomialTree,
	ScatterAllgather,
	Pipeline{ segments: usize },
}

impl std::fmt::Display for BroadcastAlgorithm
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		match self
		{
			BroadcastAlgorithm::BinomialTree => write!(f, "binomial_tree"),
			BroadcastAlgorithm::ScatterAllgather => write!(f, "scatter_allgather"),
			BroadcastAlgorithm::Pipeline{segments} => write!(f, "pipeline(segments={})", segments),
		}
	}
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum ReduceAlgorithm
{
	BinomialTree,
	ScatterGatherToRoot,
}

impl std::fmt::Display for ReduceAlgorithm
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		match self
		{
			ReduceAlgorithm::BinomialTree => write!(f, "binomial_tree"),
			ReduceAlgorithm::ScatterGatherToRoot => write!(f, "scatter_gather_to_root"),
		}
	}
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum AllreduceAlgorithm
{
	RecursiveDoubling,
	HalvingDoubling,
	Ring,
	///A non-commutative operator was requested; falls back to a binomial
	///tree reduce onto rank 0 followed by a binomial tree broadcast, per §7
	///error kind 3.
	BinomialTreeReduceThenBroadcast,
}

impl std::fmt::Display for AllreduceAlgorithm
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		match self
		{
			AllreduceAlgorithm::RecursiveDoubling => write!(f, "recursive_doubling"),
			AllreduceAlgorithm::HalvingDoubling => write!(f, "halving_doubling"),
			AllreduceAlgorithm::Ring => write!(f, "ring"),
			AllreduceAlgorithm::BinomialTreeReduceThenBroadcast => write!(f, "binomial_tree_reduce_then_broadcast"),
		}
	}
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum AllgatherAlgorithm
{
	RecursiveDoubling,
	Ring,
}

impl std::fmt::Display for AllgatherAlgorithm
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		match self
		{
			AllgatherAlgorithm::RecursiveDoubling => write!(f, "recursive_doubling"),
			AllgatherAlgorithm::Ring => write!(f, "ring"),
		}
	}
}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
enum Decision
{
	Broadcast(BroadcastAlgorithm),
	Reduce(ReduceAlgorithm),
	Allreduce(AllreduceAlgorithm),
	Allgather(AllgatherAlgorithm),
}

type CacheKey = (OpKind,usize,u32);

fn size_bucket(message_bytes: usize) -> u32
{
	algorithms::log2_ceil(message_bytes.max(1))
}

///The optimizer: owns the [`NetworkCharacteristics`] model, a bounded
///decision cache, and (optionally) a [`PerformanceReport`] sink.
pub struct CollectiveOptimizer<W: std::io::Write>
{
	model: NetworkCharacteristics,
	cache: Mutex<LruCache<CacheKey,Decision>>,
	report: Option<Mutex<PerformanceReport<W>>>,
}

impl<W: std::io::Write> CollectiveOptimizer<W>
{
	pub fn network_characteristics(&self) -> &NetworkCharacteristics { &self.model }

	fn decide<F: FnOnce() -> Decision>(&self, key: CacheKey, compute: F) -> Decision
	{
		let mut cache = self.cache.lock().expect("decision cache mutex poisoned");
		if let Some(cached) = cache.get(&key) { return *cached; }
		let decision = compute();
		cache.put(key, decision);
		decision
	}

	fn decide_broadcast(&self, descriptor: &CallDescriptor) -> BroadcastAlgorithm
	{
		let bytes = descriptor.message_bytes().unwrap_or(usize::MAX);
		let key = (OpKind::Broadcast, descriptor.world_size, size_bucket(bytes));
		match self.decide(key, ||
		{
			let algorithm = if bytes <= t_small_bytes(&self.model)
			{
				BroadcastAlgorithm::BinomialTree
			}
			else if bytes >= t_large_bytes(&self.model) && descriptor.world_size >= 8
			{
				BroadcastAlgorithm::ScatterAllgather
			}
			else if self.model.has_long_diameter_linear_structure()
			{
				BroadcastAlgorithm::Pipeline{ segments: pipeline_segment_count(&self.model, descriptor.world_size, bytes) }
			}
			else
			{
				BroadcastAlgorithm::BinomialTree
			};
			Decision::Broadcast(algorithm)
		})
		{
			Decision::Broadcast(algorithm) => algorithm,
			_ => unreachable!("cache key namespaced by OpKind::Broadcast"),
		}
	}

	fn decide_reduce(&self, descriptor: &CallDescriptor) -> ReduceAlgorithm
	{
		let bytes = descriptor.message_bytes().unwrap_or(usize::MAX);
		let key = (OpKind::Reduce, descriptor.world_size, size_bucket(bytes));
		match self.decide(key, ||
		{
			let algorithm = if bytes <= t_small_bytes(&self.model) { ReduceAlgorithm::BinomialTree } else { ReduceAlgorithm::ScatterGatherToRoot };
			Decision::Reduce(algorithm)
		})
		{
			Decision::Reduce(algorithm) => algorithm,
			_ => unreachable!("cache key namespaced by OpKind::Reduce"),
		}
	}

	fn decide_allreduce(&self, descriptor: &CallDescriptor, op: ReductionOp) -> AllreduceAlgorithm
	{
		if !op.is_commutative_associative()
		{
			return AllreduceAlgorithm::BinomialTreeReduceThenBroadcast;
		}
		let bytes = descriptor.message_bytes().unwrap_or(usize::MAX);
		let key = (OpKind::Allreduce, descriptor.world_size, size_bucket(bytes));
		match self.decide(key, ||
		{
			let world_size = descriptor.world_size;
			let algorithm = if !is_power_of_two(world_size)
			{
				AllreduceAlgorithm::Ring
			}
			else if bytes <= t_small_bytes(&self.model)
			{
				AllreduceAlgorithm::RecursiveDoubling
			}
			else if bytes >= t_large_bytes(&self.model)
			{
				AllreduceAlgorithm::Ring
			}
			else
			{
				AllreduceAlgorithm::HalvingDoubling
			};
			Decision::Allreduce(algorithm)
		})
		{
			Decision::Allreduce(algorithm) => algorithm,
			_ => unreachable!("cache key namespaced by OpKind::Allreduce"),
		}
	}

	fn decide_allgather(&self, descriptor: &CallDescriptor) -> AllgatherAlgorithm
	{
		let chunk_bytes = descriptor.message_bytes().unwrap_or(usize::MAX);
		let key = (OpKind::Allgather, descriptor.world_size, size_bucket(chunk_bytes));
		match self.decide(key, ||
		{
			let algorithm = if is_power_of_two(descriptor.world_size) && chunk_bytes <= t_small_bytes(&self.model)
			{
				AllgatherAlgorithm::RecursiveDoubling
			}
			else
			{
				AllgatherAlgorithm::Ring
			};
			Decision::Allgather(algorithm)
		})
		{
			Decision::Allgather(algorithm) => algorithm,
			_ => unreachable!("cache key namespaced by OpKind::Allgather"),
		}
	}

	fn report_row(&self, op: OpKind, algorithm: &str, root: Option<usize>, bytes: usize, participants: usize, elapsed_us: f64)
	{
		log::info!("{} via {} on {} ranks ({} bytes): {:.3}us", op, algorithm, participants, bytes, elapsed_us);
		if let Some(report) = &self.report
		{
			let mut report = report.lock().expect("report mutex poisoned");
			if let Err(e) = report.record(op, root, bytes, participants, algorithm, elapsed_us)
			{
				log::warn!("failed to persist performance report row: {}", e);
			}
		}
	}

	///Broadcast `buf` (valid on `root` on entry) to every rank.
	pub fn optimize_broadcast<S: Substrate + ?Sized>(&self, substrate: &S, buf: &mut [f64], root: usize) -> Result<()>
	{
		let descriptor = CallDescriptor{ op_kind: OpKind::Broadcast, root: Some(root), count: buf.len(), datatype_size: std::mem::size_of::<f64>(), reduction_op: None, world_size: substrate.size() };
		let bytes = descriptor.message_bytes().ok_or_else(|| Error::SizeMismatch(format!("broadcast of {} elements overflows byte count", buf.len())))?;
		let algorithm = self.decide_broadcast(&descriptor);
		log::trace!("broadcast: dispatching {} among {} ranks, root {}", algorithm, descriptor.world_size, root);
		let start = substrate.wtime();
		match algorithm
		{
			BroadcastAlgorithm::BinomialTree => algorithms::broadcast::binomial_tree_broadcast(substrate, buf, root)?,
			BroadcastAlgorithm::ScatterAllgather => algorithms::broadcast::scatter_allgather_broadcast(substrate, buf, root)?,
			BroadcastAlgorithm::Pipeline{..} => algorithms::broadcast::pipeline_broadcast(substrate, buf, root, &self.model)?,
		}
		let elapsed_us = (substrate.wtime() - start) * 1e6;
		self.report_row(OpKind::Broadcast, &algorithm.to_string(), Some(root), bytes, descriptor.world_size, elapsed_us);
		Ok(())
	}

	///Reduce `buf` (this rank's contribution on entry) onto `root`.
	pub fn optimize_reduce<S: Substrate + ?Sized>(&self, substrate: &S, buf: &mut [f64], root: usize, op: ReductionOp) -> Result<()>
	{
		let descriptor = CallDescriptor{ op_kind: OpKind::Reduce, root: Some(root), count: buf.len(), datatype_size: std::mem::size_of::<f64>(), reduction_op: Some(op), world_size: substrate.size() };
		let bytes = descriptor.message_bytes().ok_or_else(|| Error::SizeMismatch(format!("reduce of {} elements overflows byte count", buf.len())))?;
		let algorithm = self.decide_reduce(&descriptor);
		log::trace!("reduce: dispatching {} among {} ranks, root {}", algorithm, descriptor.world_size, root);
		let start = substrate.wtime();
		match algorithm
		{
			ReduceAlgorithm::BinomialTree => algorithms::reduce::binomial_tree_reduce(substrate, buf, root, op)?,
			ReduceAlgorithm::ScatterGatherToRoot => algorithms::reduce::scatter_gather_reduce(substrate, buf, root, op)?,
		}
		let elapsed_us = (substrate.wtime() - start) * 1e6;
		self.report_row(OpKind::Reduce, &algorithm.to_string(), Some(root), bytes, descriptor.world_size, elapsed_us);
		Ok(())
	}

	///Allreduce `buf` (this rank's contribution on entry) to every rank.
	pub fn optimize_allreduce<S: Substrate + ?Sized>(&self, substrate: &S, buf: &mut [f64], op: ReductionOp) -> Result<()>
	{
		let descriptor = CallDescriptor{ op_kind: OpKind::Allreduce, root: None, count: buf.len(), datatype_size: std::mem::size_of::<f64>(), reduction_op: Some(op), world_size: substrate.size() };
		let bytes = descriptor.message_bytes().ok_or_else(|| Error::SizeMismatch(format!("allreduce of {} elements overflows byte count", buf.len())))?;
		let algorithm = self.decide_allreduce(&descriptor, op);
		log::trace!("allreduce: dispatching {} among {} ranks", algorithm, descriptor.world_size);
		let start = substrate.wtime();
		match algorithm
		{
			AllreduceAlgorithm::RecursiveDoubling => algorithms::allreduce::recursive_doubling_allreduce(substrate, buf, op)?,
			AllreduceAlgorithm::HalvingDoubling => algorithms::allreduce::recursive_halving_doubling_allreduce(substrate, buf, op)?,
			AllreduceAlgorithm::Ring => algorithms::allreduce::ring_allreduce(substrate, buf, op, &self.model)?,
			AllreduceAlgorithm::BinomialTreeReduceThenBroadcast =>
			{
				algorithms::reduce::binomial_tree_reduce(substrate, buf, 0, op)?;
				algorithms::broadcast::binomial_tree_broadcast(substrate, buf, 0)?;
			},
		}
		let elapsed_us = (substrate.wtime() - start) * 1e6;
		self.report_row(OpKind::Allreduce, &algorithm.to_string(), None, bytes, descriptor.world_size, elapsed_us);
		Ok(())
	}

	///Allgather: on entry, `buf[rank*chunk_len..(rank+1)*chunk_len]` holds
	///this rank's own contribution; on return every rank holds the full
	///concatenation in rank order.
	pub fn optimize_allgather<S: Substrate + ?Sized>(&self, substrate: &S, buf: &mut [f64], chunk_len: usize) -> Result<()>
	{
		let descriptor = CallDescriptor{ op_kind: OpKind::Allgather, root: None, count: chunk_len, datatype_size: std::mem::size_of::<f64>(), reduction_op: None, world_size: substrate.size() };
		let bytes = descriptor.message_bytes().ok_or_else(|| Error::SizeMismatch(format!("allgather chunk of {} elements overflows byte count", chunk_len)))?;
		if buf.len() != chunk_len * descriptor.world_size
		{
			return Err(Error::SizeMismatch(format!("allgather buffer has {} elements, expected {}", buf.len(), chunk_len * descriptor.world_size)));
		}
		let algorithm = self.decide_allgather(&descriptor);
		log::trace!("allgather: dispatching {} among {} ranks", algorithm, descriptor.world_size);
		let ring: Vec<usize> = (0..descriptor.world_size).collect();
		let start = substrate.wtime();
		match algorithm
		{
			AllgatherAlgorithm::RecursiveDoubling => algorithms::allgather::recursive_doubling_allgather(substrate, buf, chunk_len, &ring)?,
			AllgatherAlgorithm::Ring =>
			{
				let bounds = algorithms::chunk_bounds(buf.len(), descriptor.world_size);
				algorithms::allgather::ring_allgather(substrate, buf, &bounds, &ring)?
			},
		}
		let elapsed_us = (substrate.wtime() - start) * 1e6;
		self.report_row(OpKind::Allgather, &algorithm.to_string(), None, bytes, descriptor.world_size, elapsed_us);
		Ok(())
	}
}

impl CollectiveOptimizer<std::io::Sink>
{
	///Build an optimizer over `model` with no performance-report sink.
	pub fn new(model: NetworkCharacteristics) -> CollectiveOptimizer<std::io::Sink>
	{
		CollectiveOptimizer{ model, cache: Mutex::new(LruCache::new(DECISION_CACHE_CAPACITY)), report: None }
	}
}

impl<W: std::io::Write> CollectiveOptimizer<W>
{
	///Build an optimizer over `model` that appends one CSV row per call to
	///`writer` (§6 persisted artifact).
	pub fn with_report(model: NetworkCharacteristics, writer: W) -> CollectiveOptimizer<W>
	{
		CollectiveOptimizer{ model, cache: Mutex::new(LruCache::new(DECISION_CACHE_CAPACITY)), report: Some(Mutex::new(PerformanceReport::new(writer))) }
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::model::TopologyConfig;
	use crate::substrate::Switch;
	use std::thread;

	#[test]
	fn small_broadcast_selects_binomial_tree()
	{
		let model = NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let descriptor = CallDescriptor{ op_kind: OpKind::Broadcast, root: Some(0), count: 4, datatype_size: 8, reduction_op: None, world_size: 8 };
		assert_eq!(optimizer.decide_broadcast(&descriptor), BroadcastAlgorithm::BinomialTree);
	}

	#[test]
	fn large_broadcast_on_enough_ranks_selects_scatter_allgather()
	{
		let model = NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let descriptor = CallDescriptor{ op_kind: OpKind::Broadcast, root: Some(0), count: 1 << 17, datatype_size: 8, reduction_op: None, world_size: 8 };
		assert_eq!(optimizer.decide_broadcast(&descriptor), BroadcastAlgorithm::ScatterAllgather);
	}

	#[test]
	fn non_power_of_two_allreduce_selects_ring()
	{
		let model = NetworkCharacteristics::new(TopologyConfig::Flat{ world_size: 6 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let descriptor = CallDescriptor{ op_kind: OpKind::Allreduce, root: None, count: 4, datatype_size: 8, reduction_op: Some(ReductionOp::Sum), world_size: 6 };
		assert_eq!(optimizer.decide_allreduce(&descriptor, ReductionOp::Sum), AllreduceAlgorithm::Ring);
	}

	#[test]
	fn end_to_end_broadcast_through_the_optimizer()
	{
		let handles = Switch::new(4);
		let model_for = |_rank: usize| NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let results: Vec<Vec<f64>> = thread::scope(|scope|
		{
			let threads: Vec<_> = handles.into_iter().enumerate().map(|(rank,substrate)|
			{
				let model = model_for(rank);
				scope.spawn(move ||
				{
					let optimizer = CollectiveOptimizer::new(model);
					let mut buf = if rank == 0 { vec![1.0,2.0,3.0,4.0] } else { vec![0.0;4] };
					optimizer.optimize_broadcast(&substrate, &mut buf, 0).unwrap();
					buf
				})
			}).collect();
			threads.into_iter().map(|t| t.join().unwrap()).collect()
		});
		for result in results { assert_eq!(result, vec![1.0,2.0,3.0,4.0]); }
	}
}
