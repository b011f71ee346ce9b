/*!

The Measurement Harness (§4.A): point-to-point ping-pong latency,
point-to-point bandwidth, and an all-to-all bandwidth sweep, each
summarized through [`sample_set::SampleSet`]'s outlier-trimmed statistics.
The harness is what populates a [`crate::model::NetworkCharacteristics`]'s
per-tier bandwidth/latency at process-group formation (§3 Lifecycles).

*/

pub mod sample_set;
pub mod timer;

use itertools::Itertools;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::substrate::{Substrate,Tag};
use sample_set::SampleSet;

///Iterations discarded before timing starts, letting caches/branch
///predictors/TCP windows settle (§4.A).
const DEFAULT_WARMUP: usize = 5;

///Base tags for the two probes, kept far enough apart that a harness run
///mixing latency and bandwidth probes on the same pair never aliases tags,
///per the tag discipline in §5.
const LATENCY_TAG_BASE: Tag = 0x1000_0000;
const BANDWIDTH_TAG_BASE: Tag = 0x2000_0000;

///Measures one-way point-to-point latency between `ra` and `rb` by
///ping-pong: `iters` timed round trips (after `DEFAULT_WARMUP` untimed
///ones), halved and averaged. A group-wide barrier precedes every
///iteration so both endpoints start synchronized. Ranks outside `{ra,rb}`
///still join the barriers (it is group-wide) but return `0.0` and never
///touch a buffer, per the failure semantics in §4.A.
pub fn measure_point_to_point_latency<S: Substrate + ?Sized>(substrate: &S, ra: usize, rb: usize, iters: usize) -> Result<f64>
{
	let rank = substrate.rank();
	if rank != ra && rank != rb
	{
		for _ in 0..(DEFAULT_WARMUP + iters) { substrate.barrier(); }
		return Ok(0.0);
	}
	let mut sample = SampleSet::new();
	let probe = [0.0f64];
	let mut reply = [0.0f64];
	for i in 0..(DEFAULT_WARMUP + iters)
	{
		substrate.barrier();
		let tag = LATENCY_TAG_BASE + i as Tag;
		let start = substrate.wtime();
		if rank == ra
		{
			substrate.send(&probe, rb, tag)?;
			substrate.recv(&mut reply, rb, tag)?;
		}
		else
		{
			substrate.recv(&mut reply, ra, tag)?;
			substrate.send(&probe, ra, tag)?;
		}
		let round_trip_us = (substrate.wtime() - start) * 1e6;
		if i >= DEFAULT_WARMUP
		{
			sample.add(round_trip_us / 2.0);
		}
	}
	log::debug!("measured point-to-point latency {}<->{}: {:.3}us over {} iters", ra, rb, sample.mean(), iters);
	Ok(sample.mean())
}

///Measures point-to-point bandwidth between `ra` and `rb` by transferring
///an `bytes`-sized buffer `iters` times, averaging
///`(bytes·8) / (elapsed·10⁶)` Mbps per iteration. Ranks outside `{ra,rb}`
///return `0.0` without participating.
pub fn measure_point_to_point_bandwidth<S: Substrate + ?Sized>(substrate: &S, ra: usize, rb: usize, bytes: usize, iters: usize) -> Result<f64>
{
	let rank = substrate.rank();
	let count = (bytes + 7) / std::mem::size_of::<f64>();
	if rank != ra && rank != rb
	{
		for _ in 0..(DEFAULT_WARMUP + iters) { substrate.barrier(); }
		return Ok(0.0);
	}
	let mut sample = SampleSet::new();
	let payload = vec![0.0f64; count];
	let mut incoming = vec![0.0f64; count];
	let transferred_bits = (count * std::mem::size_of::<f64>()) as f64 * 8.0;
	for i in 0..(DEFAULT_WARMUP + iters)
	{
		substrate.barrier();
		let tag = BANDWIDTH_TAG_BASE + i as Tag;
		let start = substrate.wtime();
		if rank == ra
		{
			substrate.send(&payload, rb, tag)?;
		}
		else
		{
			substrate.recv(&mut incoming, ra, tag)?;
		}
		let elapsed = substrate.wtime() - start;
		if i >= DEFAULT_WARMUP && elapsed > 0.0
		{
			sample.add(transferred_bits / (elapsed * 1e6));
		}
	}
	log::debug!("measured point-to-point bandwidth {}->{}: {:.3}Mbps over {} bytes x {} iters", ra, rb, sample.mean(), bytes, iters);
	Ok(sample.mean())
}

///Measures bandwidth for every unordered pair of ranks, mirroring the
///result into a symmetric N×N [`Matrix`] with a zero diagonal (§4.A).
pub fn measure_all_to_all_bandwidth<S: Substrate + ?Sized>(substrate: &S, bytes: usize) -> Result<Matrix<f64>>
{
	let n = substrate.size();
	let mut matrix = Matrix::constant(0.0, n, n);
	for (ra, rb) in (0..n).tuple_combinations()
	{
		let mbps = measure_point_to_point_bandwidth(substrate, ra, rb, bytes, 1)?;
		matrix.set_symmetric(ra, rb, mbps);
	}
	Ok(matrix)
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::substrate::Switch;
	use std::thread;

	#[test]
	fn latency_is_positive_and_bystanders_see_zero()
	{
		let handles = Switch::new(3);
		let results: Vec<f64> = thread::scope(|scope|
		{
			let threads: Vec<_> = handles.into_iter().map(|substrate| scope.spawn(move ||
			{
				measure_point_to_point_latency(&substrate, 0, 1, 3).unwrap()
			})).collect();
			threads.into_iter().map(|t| t.join().unwrap()).collect()
		});
		assert!(results[0] >= 0.0);
		assert!(results[1] >= 0.0);
		assert_eq!(results[2], 0.0);
	}

	#[test]
	fn all_to_all_matrix_has_zero_diagonal()
	{
		let handles = Switch::new(4);
		let matrices: Vec<Matrix<f64>> = thread::scope(|scope|
		{
			let threads: Vec<_> = handles.into_iter().map(|substrate| scope.spawn(move ||
			{
				measure_all_to_all_bandwidth(&substrate, 64).unwrap()
			})).collect();
			threads.into_iter().map(|t| t.join().unwrap()).collect()
		});
		for row in 0..4
		{
			assert_eq!(*matrices[0].get(row,row), 0.0);
		}
	}
}
