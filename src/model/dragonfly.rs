/*!

Placement and distance for a dragonfly, per §4.B.

Three-level hierarchy: host → router → group, grounded on the teacher's
`topology::dragonfly::Dragonfly` (`src/topology/dragonfly.rs`), which
likewise derives a router's group and in-group index from a flat index and
answers distance from a precomputed matrix. This module keeps the same
host/router/group decomposition but computes distance directly rather than
through a cached matrix, since the host counts this crate targets are far
smaller than a packet-level router simulation's.

*/

///Coordinate of a host within a dragonfly: `(group, router_in_group, host_in_router)`.
pub type Coordinate = (usize,usize,usize);

#[derive(Clone,Copy,Debug)]
pub struct Dragonfly
{
	pub groups: usize,
	pub routers_per_group: usize,
	pub hosts_per_router: usize,
}

impl Dragonfly
{
	pub fn new(groups: usize, routers_per_group: usize, hosts_per_router: usize) -> Result<Dragonfly,String>
	{
		if groups == 0 || routers_per_group == 0 || hosts_per_router == 0
		{
			return Err(format!(
				"dragonfly shape must have non-zero groups/routers_per_group/hosts_per_router, got ({},{},{})",
				groups, routers_per_group, hosts_per_router));
		}
		Ok(Dragonfly{ groups, routers_per_group, hosts_per_router })
	}

	pub fn world_size(&self) -> usize { self.groups * self.routers_per_group * self.hosts_per_router }

	pub fn unpack(&self, rank: usize) -> Coordinate
	{
		let router_index = rank / self.hosts_per_router;
		let host_in_router = rank % self.hosts_per_router;
		let group = router_index / self.routers_per_group;
		let router_in_group = router_index % self.routers_per_group;
		(group, router_in_group, host_in_router)
	}

	pub fn pack(&self, coordinate: Coordinate) -> usize
	{
		let (group, router_in_group, host_in_router) = coordinate;
		(group * self.routers_per_group + router_in_group) * self.hosts_per_router + host_in_router
	}

	///0 for the same host, 1 for siblings on the same router, 2 for hosts in
	///the same group on different routers, 3 across groups (one global hop).
	pub fn distance(&self, ra: usize, rb: usize) -> usize
	{
		if ra == rb { return 0; }
		let (group_a, router_a, _) = self.unpack(ra);
		let (group_b, router_b, _) = self.unpack(rb);
		if group_a == group_b && router_a == router_b { 1 }
		else if group_a == group_b { 2 }
		else { 3 }
	}
}
