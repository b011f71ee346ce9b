/*!

Allreduce algorithms (§4.C items 4-5): recursive doubling, recursive-halving
reduce-scatter followed by recursive-doubling (or ring) allgather, and ring.
All three require a commutative, associative [`ReductionOp`]; every operator
this crate defines satisfies that, but the check stays in place per-algorithm
so a future non-commutative operator fails loudly here rather than silently
reordering someone's sum.

*/

use crate::error::{Error,Result};
use crate::model::NetworkCharacteristics;
use crate::reduction::ReductionOp;
use crate::substrate::{Substrate,Tag};
use super::{allgather,chunk_bounds,is_power_of_two,largest_power_of_two_leq,log2_ceil};

const ALLREDUCE_TAG_BASE: Tag = 0x5000;

fn require_commutative(op: ReductionOp, algorithm: &'static str) -> Result<()>
{
	if op.is_commutative_associative() { Ok(()) } else { Err(Error::UnsupportedOperator{ op, algorithm }) }
}

///Recursive doubling (§4.C item 4, small-message case): `⌈log₂N⌉` rounds,
///each a full-vector exchange with the partner at `rank ^ (1<<i)` followed by
///a local reduce. Requires a power-of-two `world_size`; the optimizer only
///selects this for groups that are.
pub fn recursive_doubling_allreduce<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], op: ReductionOp) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	require_commutative(op, "recursive_doubling_allreduce")?;
	if !is_power_of_two(world_size)
	{
		return Err(Error::Configuration(format!("recursive-doubling allreduce requires a power-of-two group, got {}", world_size)));
	}
	let rank = substrate.rank();
	let rounds = log2_ceil(world_size);
	let mut incoming = vec![0.0; buf.len()];
	for i in 0..rounds
	{
		let partner = rank ^ (1usize << i);
		let tag = ALLREDUCE_TAG_BASE + i as Tag;
		log::trace!("recursive_doubling_allreduce: round {} exchanging with rank {}", i, partner);
		substrate.send(buf, partner, tag)?;
		substrate.recv(&mut incoming, partner, tag)?;
		substrate.reduce_local(op, &incoming, buf);
	}
	Ok(())
}

///Recursive-halving reduce-scatter followed by a doubling allgather (§4.C
///item 4, large-message case), Rabenseifner's algorithm. When `world_size`
///is not a power of two, the extra ranks fold into their even-indexed
///neighbor before the core exchange and unfold back out afterwards, so the
///recursive-halving/doubling core only ever runs on a power-of-two subset.
pub fn recursive_halving_doubling_allreduce<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], op: ReductionOp) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	require_commutative(op, "recursive_halving_doubling_allreduce")?;
	let rank = substrate.rank();
	let pow2 = largest_power_of_two_leq(world_size);
	let extra = world_size - pow2;

	let mut participates = true;
	let mut virtual_rank = rank;
	if rank < 2 * extra
	{
		if rank % 2 == 0
		{
			log::trace!("recursive_halving_doubling_allreduce: fold receiving from rank {}", rank + 1);
			let mut incoming = vec![0.0; buf.len()];
			substrate.recv(&mut incoming, rank + 1, ALLREDUCE_TAG_BASE)?;
			substrate.reduce_local(op, &incoming, buf);
			virtual_rank = rank / 2;
		}
		else
		{
			log::trace!("recursive_halving_doubling_allreduce: fold sending to rank {}", rank - 1);
			substrate.send(buf, rank - 1, ALLREDUCE_TAG_BASE)?;
			participates = false;
		}
	}
	else
	{
		virtual_rank = rank - extra;
	}

	if participates
	{
		let virtual_to_absolute: Vec<usize> = (0..pow2).map(|v| if v < extra { v * 2 } else { v + extra }).collect();
		let bounds = chunk_bounds(buf.len(), pow2);

		// Recursive-halving reduce-scatter: narrow [lo,hi) each round until it
		// collapses to exactly our own virtual rank's chunk, fully reduced.
		let mut lo = 0usize;
		let mut hi = pow2;
		let mut depth: Tag = 0;
		while hi - lo > 1
		{
			let half = (hi - lo) / 2;
			let mid = lo + half;
			let partner_virtual = virtual_rank ^ half;
			let partner_abs = virtual_to_absolute[partner_virtual];
			let tag = ALLREDUCE_TAG_BASE + 0x1000 + depth;
			let (mine_lo, mine_hi, other_lo, other_hi) = if virtual_rank < mid { (lo,mid,mid,hi) } else { (mid,hi,lo,mid) };
			let mine_start = bounds[mine_lo].0;
			let mine_end = bounds[mine_hi-1].0 + bounds[mine_hi-1].1;
			let other_start = bounds[other_lo].0;
			let other_end = bounds[other_hi-1].0 + bounds[other_hi-1].1;
			log::trace!("recursive_halving_doubling_allreduce: reduce-scatter depth {} exchanging with rank {}", depth, partner_abs);
			let mut incoming = vec![0.0; mine_end - mine_start];
			substrate.send(&buf[other_start..other_end], partner_abs, tag)?;
			substrate.recv(&mut incoming, partner_abs, tag)?;
			substrate.reduce_local(op, &incoming, &mut buf[mine_start..mine_end]);
			lo = mine_lo;
			hi = mine_hi;
			depth += 1;
		}

		if pow2 > 1
		{
			if buf.len() % pow2 == 0
			{
				allgather::recursive_doubling_allgather(substrate, buf, buf.len() / pow2, &virtual_to_absolute)?;
			}
			else
			{
				allgather::ring_allgather(substrate, buf, &bounds, &virtual_to_absolute)?;
			}
		}
	}

	if rank < 2 * extra
	{
		if rank % 2 == 0
		{
			log::trace!("recursive_halving_doubling_allreduce: unfold sending to rank {}", rank + 1);
			substrate.send(buf, rank + 1, ALLREDUCE_TAG_BASE + 1)?;
		}
		else
		{
			log::trace!("recursive_halving_doubling_allreduce: unfold receiving from rank {}", rank - 1);
			substrate.recv(buf, rank - 1, ALLREDUCE_TAG_BASE + 1)?;
		}
	}
	Ok(())
}

///Ring allreduce (§4.C item 5): a topology-aware ring
///([`super::greedy_nearest_neighbor_order`] rooted at rank 0, so every rank
///computes the same ring independently), reduce-scattered around the ring in
///`N-1` steps and then allgathered back around it in `N-1` more. Bandwidth-optimal
///regardless of `N`'s power-of-two-ness, at the cost of `2(N-1)` sequential
///rounds versus recursive halving/doubling's `2⌈log₂N⌉`.
pub fn ring_allreduce<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], op: ReductionOp, model: &NetworkCharacteristics) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	require_commutative(op, "ring_allreduce")?;
	let ring = super::greedy_nearest_neighbor_order(model, 0);
	let rank = substrate.rank();
	let position = ring.iter().position(|&r| r == rank)
		.ok_or_else(|| Error::Configuration(format!("rank {} missing from its own allreduce ring", rank)))?;
	let next = ring[(position + 1) % world_size];
	let previous = ring[(position + world_size - 1) % world_size];
	let bounds = chunk_bounds(buf.len(), world_size);

	// Reduce-scatter: after step s, position `pos` has folded chunk
	// `(pos-s-1) mod N` into its running total.
	for s in 0..(world_size - 1)
	{
		let send_idx = (position + world_size - s) % world_size;
		let recv_idx = (position + world_size - s - 1) % world_size;
		let tag = ALLREDUCE_TAG_BASE + 0x2000 + s as Tag;
		let (send_start, send_len) = bounds[send_idx];
		let (recv_start, recv_len) = bounds[recv_idx];
		let mut incoming = vec![0.0; recv_len];
		log::trace!("ring_allreduce: reduce-scatter step {} sending to rank {} receiving from rank {}", s, next, previous);
		if send_start < recv_start
		{
			let (left, right) = buf.split_at_mut(recv_start);
			substrate.send(&left[send_start..send_start+send_len], next, tag)?;
			substrate.recv(&mut incoming, previous, tag)?;
			substrate.reduce_local(op, &incoming, &mut right[..recv_len]);
		}
		else
		{
			let (left, right) = buf.split_at_mut(send_start);
			substrate.recv(&mut incoming, previous, tag)?;
			substrate.send(&right[..send_len], next, tag)?;
			substrate.reduce_local(op, &incoming, &mut left[recv_start..recv_start+recv_len]);
		}
	}

	// Allgather: circulate the now-fully-reduced chunks the rest of the way
	// around the ring, overwriting rather than reducing.
	for s in 0..(world_size - 1)
	{
		let send_idx = (position + world_size - s + 1) % world_size;
		let recv_idx = (position + world_size - s) % world_size;
		let tag = ALLREDUCE_TAG_BASE + 0x3000 + s as Tag;
		let (send_start, send_len) = bounds[send_idx];
		let (recv_start, recv_len) = bounds[recv_idx];
		log::trace!("ring_allreduce: allgather step {} sending to rank {} receiving from rank {}", s, next, previous);
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
	}
	Ok(())
}
