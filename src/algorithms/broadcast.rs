/*!

Broadcast algorithms (§4.C items 1-3): binomial tree, scatter-allgather, and
pipeline, all driving a single [`crate::substrate::Substrate`].

*/

use crate::error::{Error,Result};
use crate::model::NetworkCharacteristics;
use crate::substrate::{Substrate,Tag};
use super::{allgather,chunk_bounds,log2_ceil,pipeline_segment_count};

const BROADCAST_TAG_BASE: Tag = 0x1000;

///The relative rank of `rank` with respect to `root` in a `world_size`-ary
///binomial tree: root is always relative rank `0`.
fn relative_rank(rank: usize, root: usize, world_size: usize) -> usize
{
	(rank + world_size - root) % world_size
}

fn absolute_rank(relative: usize, root: usize, world_size: usize) -> usize
{
	(relative + root) % world_size
}

///Binomial tree broadcast (§4.C item 1): `⌈log₂N⌉` rounds. At round `i`,
///every rank whose root-relative rank is `< 2^i` (it already has the data)
///sends to the rank at relative rank `+2^i`, if that relative rank exists.
///`buf` holds the data to send on `root`; every other rank's `buf` is
///populated by the end of the call.
pub fn binomial_tree_broadcast<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], root: usize) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	let rank = substrate.rank();
	let relative = relative_rank(rank, root, world_size);
	let rounds = log2_ceil(world_size);
	for i in 0..rounds
	{
		let half = 1usize << i;
		let tag = BROADCAST_TAG_BASE + i as Tag;
		if relative < half
		{
			let partner_relative = relative + half;
			if partner_relative < world_size
			{
				let peer = absolute_rank(partner_relative, root, world_size);
				log::trace!("binomial_tree_broadcast: round {} sending to rank {}", i, peer);
				substrate.send(buf, peer, tag)?;
			}
		}
		else if relative < half * 2
		{
			let sender_relative = relative - half;
			let peer = absolute_rank(sender_relative, root, world_size);
			log::trace!("binomial_tree_broadcast: round {} receiving from rank {}", i, peer);
			substrate.recv(buf, peer, tag)?;
		}
	}
	Ok(())
}

///Scatter-allgather broadcast (§4.C item 2): a binomial scatter splits `buf`
///into `world_size` chunks (root-relative chunk `r` goes to the rank at
///relative rank `r`), then [`allgather::ring_allgather`] reassembles the full
///buffer everywhere. Preferred over the binomial tree for large messages,
///where halving the per-round payload outweighs paying `2(N-1)` messages
///instead of `N-1`.
pub fn scatter_allgather_broadcast<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], root: usize) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	let rank = substrate.rank();
	let relative = relative_rank(rank, root, world_size);
	let bounds = chunk_bounds(buf.len(), world_size);

	// Binomial scatter: the interval [lo,hi) of relative ranks currently
	// shares the chunks [lo,hi) of the original buffer, held by the rank at
	// relative rank `owner`. Each round halves the interval the caller
	// belongs to until it collapses to exactly its own chunk.
	let mut lo = 0usize;
	let mut hi = world_size;
	let mut owner = 0usize;
	let mut depth: Tag = 0;
	while hi - lo > 1
	{
		let mid = lo + (hi - lo + 1) / 2;
		let tag = BROADCAST_TAG_BASE + 0x1000 + depth;
		let (start, _) = bounds[mid.min(bounds.len()-1)];
		let (last_start, last_len) = bounds[hi-1];
		let sub_start = start;
		let sub_end = last_start + last_len;
		if relative == owner
		{
			let peer = absolute_rank(mid, root, world_size);
			log::trace!("scatter_allgather_broadcast: scatter depth {} sending to rank {}", depth, peer);
			substrate.send(&buf[sub_start..sub_end], peer, tag)?;
		}
		else if relative == mid
		{
			let peer = absolute_rank(owner, root, world_size);
			log::trace!("scatter_allgather_broadcast: scatter depth {} receiving from rank {}", depth, peer);
			substrate.recv(&mut buf[sub_start..sub_end], peer, tag)?;
		}
		if relative < mid { hi = mid; } else { lo = mid; owner = mid; }
		depth += 1;
	}

	// Phase 2: reassemble. Chunk `r` (original buffer order) lives at the
	// rank whose relative rank is `r`, so the ring is the relative-rank
	// order mapped back through `root`.
	let ring: Vec<usize> = (0..world_size).map(|r| absolute_rank(r, root, world_size)).collect();
	allgather::ring_allgather(substrate, buf, &bounds, &ring)
}

///Pipeline broadcast (§4.C item 3): `buf` is split into
///[`pipeline_segment_count`] segments, and segments flow one hop per round
///along a topology-aware chain starting at `root` — the chain visits every
///rank via [`super::greedy_nearest_neighbor_order`] rooted at `root`, so
///consecutive hops are topology-adjacent where possible. Preferred on
///long-diameter, mostly-linear topologies (torus) where a tree shape wastes
///the extra link dimensions a chain can exploit.
pub fn pipeline_broadcast<S: Substrate + ?Sized>(substrate: &S, buf: &mut [f64], root: usize, model: &NetworkCharacteristics) -> Result<()>
{
	let world_size = substrate.size();
	if world_size <= 1 { return Ok(()); }
	let rank = substrate.rank();
	let message_bytes = buf.len() * std::mem::size_of::<f64>();
	let segments = pipeline_segment_count(model, world_size, message_bytes).min(buf.len().max(1));
	let bounds = chunk_bounds(buf.len(), segments.max(1));

	let chain = super::greedy_nearest_neighbor_order(model, root);
	let position = chain.iter().position(|&r| r == rank)
		.ok_or_else(|| Error::Configuration(format!("rank {} missing from its own broadcast chain", rank)))?;

	for (seg_index, &(start,len)) in bounds.iter().enumerate()
	{
		if len == 0 { continue; }
		let tag = BROADCAST_TAG_BASE + 0x2000 + seg_index as Tag;
		if position > 0
		{
			let predecessor = chain[position - 1];
			log::trace!("pipeline_broadcast: segment {} receiving from rank {}", seg_index, predecessor);
			substrate.recv(&mut buf[start..start+len], predecessor, tag)?;
		}
		if position + 1 < chain.len()
		{
			let successor = chain[position + 1];
			log::trace!("pipeline_broadcast: segment {} sending to rank {}", seg_index, successor);
			substrate.send(&buf[start..start+len], successor, tag)?;
		}
	}
	Ok(())
}
