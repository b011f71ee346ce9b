//! End-to-end scenarios from the optimizer's worked examples (§8): broadcast,
//! allreduce (sum and max), allgather on a torus, and the boundary cases
//! (single rank, non-power-of-two group sizes).

mod common;
use common::*;

use topo_collectives::model::TopologyConfig;
use topo_collectives::optimizer::CollectiveOptimizer;
use topo_collectives::reduction::ReductionOp;

#[test]
fn four_rank_broadcast_from_root_zero()
{
	assert_broadcast_oracle(TopologyConfig::FatTree{ k: 4 }, 4, 0, &[1.0,2.0,3.0,4.0]);
}

#[test]
fn four_rank_allreduce_sum_matches_native_and_the_closed_form()
{
	// closed form: sum over rank 0..4 of (r+1) = 1+2+3+4 = 10, of (r+2) = 2+3+4+5 = 14
	assert_allreduce_oracle(TopologyConfig::FatTree{ k: 4 }, 4, ReductionOp::Sum, |rank| vec![(rank+1) as f64, (rank+2) as f64]);
}

#[test]
fn four_rank_reduce_sum_matches_the_closed_form()
{
	let result = run_reduce_via(TopologyConfig::FatTree{ k: 4 }, 4, 0, ReductionOp::Sum, |rank| vec![(rank+1) as f64, (rank+2) as f64]);
	assert_eq!(result, vec![10.0,14.0]);
}

#[test]
fn eight_rank_fat_tree_large_broadcast_selects_scatter_allgather_and_is_bit_exact()
{
	let data = sequential_data(1 << 17, 0.0); // 1 MiB of f64
	let handles_data = data.clone();
	let results = run_ranks(8, move |rank,substrate|
	{
		let model = topo_collectives::model::NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = if rank == 0 { handles_data.clone() } else { vec![0.0; handles_data.len()] };
		optimizer.optimize_broadcast(&substrate, &mut buf, 0).unwrap();
		buf
	});
	for result in &results
	{
		assert_eq!(result, &data);
	}
}

#[test]
fn sixteen_rank_torus_ring_allgather_assembles_rank_order_sequence()
{
	let results = native_allgather_ring(16, 64, |rank| (0..64).map(|i| (rank*64+i) as f64).collect());
	let expected: Vec<f64> = (0..1024).map(|i| i as f64).collect();
	for result in &results
	{
		assert_eq!(result, &expected);
	}
}

#[test]
fn four_rank_allreduce_max_picks_the_largest_rank()
{
	let results = run_ranks(4, |rank,substrate|
	{
		let model = topo_collectives::model::NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = vec![rank as f64];
		optimizer.optimize_allreduce(&substrate, &mut buf, ReductionOp::Max).unwrap();
		buf
	});
	for result in &results
	{
		assert_eq!(result, &vec![3.0]);
	}
}

#[test]
fn single_rank_collectives_are_no_ops()
{
	let broadcast = run_ranks(1, |_rank,substrate|
	{
		let model = topo_collectives::model::NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = vec![7.0,8.0];
		optimizer.optimize_broadcast(&substrate, &mut buf, 0).unwrap();
		buf
	});
	assert_eq!(broadcast, vec![vec![7.0,8.0]]);

	let allreduce = run_ranks(1, |_rank,substrate|
	{
		let model = topo_collectives::model::NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf = vec![5.0];
		optimizer.optimize_allreduce(&substrate, &mut buf, ReductionOp::Sum).unwrap();
		buf
	});
	assert_eq!(allreduce, vec![vec![5.0]]);
}

#[test]
fn two_rank_broadcast()
{
	assert_broadcast_oracle(TopologyConfig::Flat{ world_size: 2 }, 2, 1, &[9.0]);
}

#[test]
fn empty_message_allreduce_is_a_no_op()
{
	let results = run_ranks(4, |rank,substrate|
	{
		let model = topo_collectives::model::NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		let optimizer = CollectiveOptimizer::new(model);
		let mut buf: Vec<f64> = vec![];
		optimizer.optimize_allreduce(&substrate, &mut buf, ReductionOp::Sum).unwrap();
		let _ = rank;
		buf
	});
	for result in &results
	{
		assert!(result.is_empty());
	}
}

#[test]
fn non_power_of_two_group_allreduce_matches_native_ring()
{
	assert_allreduce_oracle(TopologyConfig::Flat{ world_size: 6 }, 6, ReductionOp::Sum, |rank| vec![rank as f64, (rank*2) as f64]);
}

#[test]
fn non_power_of_two_group_reduce_matches_the_closed_form_sum()
{
	let result = run_reduce_via(TopologyConfig::Flat{ world_size: 5 }, 5, 2, ReductionOp::Sum, |rank| vec![rank as f64 + 1.0]);
	assert_eq!(result, vec![(1..=5).sum::<i32>() as f64]);
}

#[test]
fn optimizer_allgather_matches_native_ring_on_an_eight_rank_torus()
{
	let optimized = run_allgather_via(TopologyConfig::Torus{ sides: vec![4,2] }, 8, 3, |rank| vec![rank as f64 * 10.0, rank as f64 * 10.0 + 1.0, rank as f64 * 10.0 + 2.0]);
	let native = native_allgather_ring(8, 3, |rank| vec![rank as f64 * 10.0, rank as f64 * 10.0 + 1.0, rank as f64 * 10.0 + 2.0]);
	assert_eq!(optimized, native);
}

#[test]
fn binomial_tree_reduce_matches_the_optimizer_on_a_small_message()
{
	let via_optimizer = run_reduce_via(TopologyConfig::FatTree{ k: 4 }, 4, 2, ReductionOp::Max, |rank| vec![rank as f64]);
	let via_native = native_reduce_binomial(4, 2, ReductionOp::Max, |rank| vec![rank as f64]);
	assert_eq!(via_optimizer, via_native);
	assert_eq!(via_optimizer, vec![3.0]);
}
