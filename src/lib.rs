/*!
topo-collectives
=====

A topology-aware optimizer for collective communication in message-passing
programs. Given a [`model::NetworkCharacteristics`] describing the process
group's interconnect and a [`substrate::Substrate`] implementation supplying
point-to-point send/recv, this crate picks and runs a concrete algorithm for
broadcast, reduce, allreduce and allgather, favoring the algorithm whose
communication pattern best matches the measured topology and message size
over a one-size-fits-all implementation.

# Usage

This crate is `topo-collectives`. To use it add `topo-collectives` to your
dependencies in your project's `Cargo.toml`.

```toml
[dependencies]
topo-collectives = "0.1"
```

# Public Interface

Build a [`model::NetworkCharacteristics`] once per process group (its shape
is supplied at construction, not auto-discovered), optionally refine its
per-tier bandwidth/latency with the [`measurement`] harness, then hand it to
a [`optimizer::CollectiveOptimizer`]. Every collective goes through one of
its four entry points:

* [`optimizer::CollectiveOptimizer::optimize_broadcast`]
* [`optimizer::CollectiveOptimizer::optimize_reduce`]
* [`optimizer::CollectiveOptimizer::optimize_allreduce`]
* [`optimizer::CollectiveOptimizer::optimize_allgather`]

Each call runs the optimizer's `DECIDE -> DISPATCH -> EXECUTE -> REPORT`
state machine: consult (and populate) a bounded decision cache keyed on the
call shape, dispatch to the matching function in [`algorithms`], execute it
against the caller's `Substrate`, then log the decision and optionally
append a row to a [`report::PerformanceReport`].

Callers needing a concrete algorithm directly, bypassing the optimizer's
policy (for testing, or to force a specific communication pattern), can call
into [`algorithms::broadcast`], [`algorithms::reduce`],
[`algorithms::allreduce`] or [`algorithms::allgather`] themselves.

# Breaking changes

<details>

## [0.1.0]

* Initial release: the Collective Optimizer, the Network Characteristics
  model (fat-tree, torus, dragonfly, flat), the Measurement Harness, and the
  Algorithm Library (binomial tree, scatter-allgather, pipeline, recursive
  doubling, recursive halving-doubling, ring, scatter-gather-to-root).

</details>
*/

pub mod algorithms;
pub mod descriptor;
pub mod error;
pub mod lru_cache;
pub mod matrix;
pub mod measurement;
pub mod model;
pub mod optimizer;
pub mod reduction;
pub mod report;
pub mod substrate;

pub use descriptor::{CallDescriptor,OpKind};
pub use error::{Error,Result};
pub use model::{NetworkCharacteristics,TopologyConfig,TopologyKind};
pub use optimizer::CollectiveOptimizer;
pub use reduction::ReductionOp;
pub use report::PerformanceReport;
pub use substrate::{MockSubstrate,Substrate,Switch,Tag};

/// Get the number currently written in the Cargo.toml field `version`.
pub fn get_version_number() -> &'static str
{
	match option_env!("CARGO_PKG_VERSION")
	{
		Some( version ) => version,
		_ => "?",
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::thread;

	///A small smoke test exercising the public surface end to end: build a
	///model, an optimizer, and run a broadcast across real threads.
	#[test]
	fn broadcast_through_the_public_api()
	{
		let model = NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let handles = Switch::new(4);
		let results: Vec<Vec<f64>> = thread::scope(|scope|
		{
			let threads: Vec<_> = handles.into_iter().enumerate().map(|(rank,substrate)|
			{
				let optimizer = &optimizer;
				scope.spawn(move ||
				{
					let mut buf = if rank == 0 { vec![1.0,2.0,3.0] } else { vec![0.0;3] };
					optimizer.optimize_broadcast(&substrate, &mut buf, 0).unwrap();
					buf
				})
			}).collect();
			threads.into_iter().map(|t| t.join().unwrap()).collect()
		});
		for result in results { assert_eq!(result, vec![1.0,2.0,3.0]); }
	}
}
