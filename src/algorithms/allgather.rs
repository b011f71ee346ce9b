/*!

Allgather algorithms (§4.C item 6): every rank's own chunk is known to
already sit at its designated slot in `buf`; after the call every rank holds
the full concatenation.

*/

use crate::error::{Error,Result};
use crate::substrate::{Substrate,Tag};
use super::is_power_of_two;

const ALLGATHER_TAG_BASE: Tag = 0x3000;

///Ring allgather: `world_size - 1` rounds, each forwarding the
///most-recently-received chunk one hop further around `ring`. Works for any
///`ring` length and any (possibly uneven) `chunk_bounds`, so it is also what
///[`super::broadcast::scatter_allgather_broadcast`] reuses for its
///reassembly phase.
pub fn ring_allgather<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], chunk_bounds: &[(usize,usize)], ring: &[usize]) -> Result<()>
{
	let n = ring.len();
	if n <= 1 { return Ok(()); }
	let rank = substrate.rank();
	let position = ring.iter().position(|&r| r == rank)
		.ok_or_else(|| Error::Configuration(format!("rank {} missing from its own allgather ring", rank)))?;
	let next = ring[(position + 1) % n];
	let previous = ring[(position + n - 1) % n];

	let mut send_pos = position;
	for step in 0..(n - 1)
	{
		let recv_pos = (position + n - 2 - step) % n;
		let tag = ALLGATHER_TAG_BASE + step as Tag;
		let (send_start, send_len) = chunk_bounds[send_pos];
		let (recv_start, recv_len) = chunk_bounds[recv_pos];
		// Split the borrow so send and recv each see a disjoint slice even
		// when send_pos == recv_pos never happens (n>1 guarantees distinct
		// positions), but the compiler cannot see that without help.
		log::trace!("ring_allgather: step {} sending to rank {} receiving from rank {}", step, next, previous);
		if send_start < recv_start
		{
			let (left, right) = buf.split_at_mut(recv_start);
			substrate.send(&left[send_start..send_start+send_len], next, tag)?;
			substrate.recv(&mut right[..recv_len], previous, tag)?;
		}
		else
		{
			let (left, right) = buf.split_at_mut(send_start);
			substrate.recv(&mut left[recv_start..recv_start+recv_len], previous, tag)?;
			substrate.send(&right[..send_len], next, tag)?;
		}
		send_pos = recv_pos;
	}
	Ok(())
}

///Recursive-doubling allgather: requires `ring.len()` to be a power of two
///and every chunk the same size `chunk_len`. `⌈log₂N⌉` rounds, each doubling
///the contiguous, ring-position-aligned block of chunks this rank holds by
///exchanging with the partner at `position ^ (1<<i)`. Preferred over the
///ring variant for small, power-of-two-sized groups, where halving the round
///count matters more than the ring's lower per-round traffic.
pub fn recursive_doubling_allgather<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], chunk_len: usize, ring: &[usize]) -> Result<()>
{
	let n = ring.len();
	if n <= 1 { return Ok(()); }
	if !is_power_of_two(n)
	{
		return Err(Error::Configuration(format!("recursive-doubling allgather requires a power-of-two group, got {}", n)));
	}
	let rank = substrate.rank();
	let position = ring.iter().position(|&r| r == rank)
		.ok_or_else(|| Error::Configuration(format!("rank {} missing from its own allgather ring", rank)))?;
	let rounds = super::log2_ceil(n);
	for i in 0..rounds
	{
		let block_len_chunks = 1usize << i;
		let block_start = (position >> i) << i;
		let partner_position = position ^ block_len_chunks;
		let partner_block_start = block_start ^ block_len_chunks;
		let partner_rank = ring[partner_position];
		let tag = ALLGATHER_TAG_BASE + 0x1000 + i as Tag;

		let byte_len = block_len_chunks * chunk_len;
		let own_start = block_start * chunk_len;
		let partner_start = partner_block_start * chunk_len;
		log::trace!("recursive_doubling_allgather: round {} exchanging with rank {}", i, partner_rank);
		if own_start < partner_start
		{
			let (left, right) = buf.split_at_mut(partner_start);
			substrate.send(&left[own_start..own_start+byte_len], partner_rank, tag)?;
			substrate.recv(&mut right[..byte_len], partner_rank, tag)?;
		}
		else
		{
			let (left, right) = buf.split_at_mut(own_start);
			substrate.recv(&mut left[partner_start..partner_start+byte_len], partner_rank, tag)?;
			substrate.send(&right[..byte_len], partner_rank, tag)?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::substrate::Switch;
	use std::thread;

	fn run<F>(n: usize, chunk_len: usize, f: F) -> Vec<Vec<f64>>
	where F: Fn(&crate::substrate::MockSubstrate, &mut [f64]) -> Result<()> + Sync
	{
		let handles = Switch::new(n);
		thread::scope(|scope|
		{
			let threads: Vec<_> = handles.into_iter().enumerate().map(|(rank,substrate)|
			{
				let f = &f;
				scope.spawn(move ||
				{
					let mut buf = vec![-1.0; chunk_len * n];
					for i in 0..chunk_len { buf[rank*chunk_len+i] = (rank*chunk_len+i) as f64; }
					f(&substrate, &mut buf).unwrap();
					buf
				})
			}).collect();
			threads.into_iter().map(|t| t.join().unwrap()).collect()
		})
	}

	#[test]
	fn ring_allgather_assembles_the_full_concatenation()
	{
		let ring: Vec<usize> = (0..5).collect();
		let results = run(5, 2, |s,b|
		{
			let bounds = super::super::chunk_bounds(b.len(), 5);
			ring_allgather(s, b, &bounds, &ring)
		});
		let expected: Vec<f64> = (0..10).map(|i| i as f64).collect();
		for result in results { assert_eq!(result, expected); }
	}

	#[test]
	fn recursive_doubling_matches_ring_on_power_of_two()
	{
		let ring: Vec<usize> = (0..8).collect();
		let results = run(8, 3, |s,b| recursive_doubling_allgather(s, b, 3, &ring));
		let expected: Vec<f64> = (0..24).map(|i| i as f64).collect();
		for result in results { assert_eq!(result, expected); }
	}

	#[test]
	fn recursive_doubling_rejects_non_power_of_two()
	{
		let handles = Switch::new(3);
		let ring: Vec<usize> = (0..3).collect();
		let s = &handles[0];
		let mut buf = vec![0.0; 3];
		let result = recursive_doubling_allgather(s, &mut buf, 1, &ring);
		assert!(matches!(result, Err(Error::Configuration(_))));
	}
}
