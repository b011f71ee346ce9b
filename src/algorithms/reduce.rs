/*!

Reduce (§4.C item 7): combine every rank's buffer into `root`'s, via a
binomial tree. Unlike the ring/recursive-halving algorithms in
[`super::allreduce`], this one never reorders the combine across ranks — each
partial sum folds its children in a fixed order before being forwarded — so
it is the one algorithm in this library that does not require
[`crate::reduction::ReductionOp::is_commutative_associative`].

*/

use crate::error::Result;
use crate::reduction::ReductionOp;
use crate::substrate::{Substrate,Tag};
use super::{chunk_bounds,largest_power_of_two_leq,log2_ceil};

const REDUCE_TAG_BASE: Tag = 0x4000;
const SCATTER_GATHER_TAG_BASE: Tag = 0x4800;

fn relative_rank(rank: usize, root: usize, world_size: usize) -> usize
{
	(rank + world_size - root) % world_size
}

fn absolute_rank(relative: usize, root: usize, world_size: usize) -> usize
{
	(relative + root) % world_size
}

///Binomial tree reduce: the mirror image of [`super::broadcast::binomial_tree_broadcast`],
///run with rounds in the opposite order so that leaves fold into their
///parent before that parent forwards its own partial result. `buf` holds
///this rank's contribution on entry; on `root` it holds the combined result
///on return, and is left in an unspecified, already-forwarded state on every
///other rank.
pub fn binomial_tree_reduce<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], root: usize, op: ReductionOp) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	let rank = substrate.rank();
	let relative = relative_rank(rank, root, world_size);
	let rounds = log2_ceil(world_size);
	let mut incoming = vec![0.0; buf.len()];
	for i in (0..rounds).rev()
	{
		let half = 1usize << i;
		let tag = REDUCE_TAG_BASE + i as Tag;
		if relative < half
		{
			let partner_relative = relative + half;
			if partner_relative < world_size
			{
				let peer = absolute_rank(partner_relative, root, world_size);
				log::trace!("binomial_tree_reduce: round {} receiving from rank {}", i, peer);
				substrate.recv(&mut incoming, peer, tag)?;
				substrate.reduce_local(op, &incoming, buf);
			}
		}
		else if relative < half * 2
		{
			let peer = absolute_rank(relative - half, root, world_size);
			log::trace!("binomial_tree_reduce: round {} sending to rank {}", i, peer);
			substrate.send(buf, peer, tag)?;
		}
	}
	Ok(())
}

///Reduce-scatter (recursive halving, folding any excess ranks the way
///[`super::allreduce::recursive_halving_doubling_allreduce`] does) followed
///by a direct gather of the finalized chunks to `root` — cheaper than a full
///allgather when only `root` needs the result (§4.D reduce policy, large m).
pub fn scatter_gather_reduce<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], root: usize, op: ReductionOp) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	let rank = substrate.rank();
	let pow2 = largest_power_of_two_leq(world_size);
	let extra = world_size - pow2;

	let mut participates = true;
	let mut virtual_rank = rank;
	if rank < 2 * extra
	{
		if rank % 2 == 0
		{
			log::trace!("scatter_gather_reduce: fold receiving from rank {}", rank + 1);
			let mut incoming = vec![0.0; buf.len()];
			substrate.recv(&mut incoming, rank + 1, SCATTER_GATHER_TAG_BASE)?;
			substrate.reduce_local(op, &incoming, buf);
			virtual_rank = rank / 2;
		}
		else
		{
			log::trace!("scatter_gather_reduce: fold sending to rank {}", rank - 1);
			substrate.send(buf, rank - 1, SCATTER_GATHER_TAG_BASE)?;
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
		let mut lo = 0usize;
		let mut hi = pow2;
		let mut depth: Tag = 0;
		while hi - lo > 1
		{
			let half = (hi - lo) / 2;
			let mid = lo + half;
			let partner_virtual = virtual_rank ^ half;
			let partner_abs = virtual_to_absolute[partner_virtual];
			let tag = SCATTER_GATHER_TAG_BASE + 0x100 + depth;
			let (mine_lo, mine_hi, other_lo, other_hi) = if virtual_rank < mid { (lo,mid,mid,hi) } else { (mid,hi,lo,mid) };
			let mine_start = bounds[mine_lo].0;
			let mine_end = bounds[mine_hi-1].0 + bounds[mine_hi-1].1;
			let other_start = bounds[other_lo].0;
			let other_end = bounds[other_hi-1].0 + bounds[other_hi-1].1;
			log::trace!("scatter_gather_reduce: reduce-scatter depth {} exchanging with rank {}", depth, partner_abs);
			let mut incoming = vec![0.0; mine_end - mine_start];
			substrate.send(&buf[other_start..other_end], partner_abs, tag)?;
			substrate.recv(&mut incoming, partner_abs, tag)?;
			substrate.reduce_local(op, &incoming, &mut buf[mine_start..mine_end]);
			lo = mine_lo;
			hi = mine_hi;
			depth += 1;
		}

		// (lo,hi) == (virtual_rank, virtual_rank+1): buf[bounds[virtual_rank]]
		// is now this participant's fully-reduced chunk. Gather every
		// participant's chunk onto `gather_target` — `root` itself if root
		// participates, else root's fold partner (root-1), which already
		// folded root's contribution in and is the nearest participant.
		let gather_target = if root < 2 * extra && root % 2 == 1 { root - 1 } else { root };
		let (chunk_start, chunk_len) = bounds[virtual_rank];
		if rank != gather_target
		{
			log::trace!("scatter_gather_reduce: gather sending chunk to rank {}", gather_target);
			substrate.send(&buf[chunk_start..chunk_start+chunk_len], gather_target, SCATTER_GATHER_TAG_BASE + 0x200)?;
		}
		else
		{
			for (v, &sender_abs) in virtual_to_absolute.iter().enumerate()
			{
				if sender_abs == gather_target { continue; }
				log::trace!("scatter_gather_reduce: gather receiving chunk from rank {}", sender_abs);
				let (start, len) = bounds[v];
				substrate.recv(&mut buf[start..start+len], sender_abs, SCATTER_GATHER_TAG_BASE + 0x200)?;
			}
			if gather_target != root
			{
				log::trace!("scatter_gather_reduce: forwarding assembled result to root rank {}", root);
				substrate.send(buf, root, SCATTER_GATHER_TAG_BASE + 0x300)?;
			}
		}
	}
	if rank == root && root < 2 * extra && root % 2 == 1
	{
		log::trace!("scatter_gather_reduce: root receiving forwarded result from rank {}", root - 1);
		substrate.recv(buf, root - 1, SCATTER_GATHER_TAG_BASE + 0x300)?;
	}
	Ok(())
}
