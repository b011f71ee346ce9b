/*!

Placement and distance for a k-ary fat-tree of compute hosts, per §4.B.

A k-ary fat-tree has `k` pods, each with `k/2` edge switches and `k/2`
aggregation switches, served by `(k/2)^2` core switches. Only the compute
hosts are ranked: rank `r` unpacks to `(pod, edge, slot)` with
`r = pod*(k/2)^2 + edge*(k/2) + slot`, mirroring the row-major packing the
teacher uses for its `CartesianData` (`src/topology/cartesian.rs`).

*/

///Coordinate of a compute host within a k-ary fat-tree: `(pod, edge, slot)`.
pub type Coordinate = (usize,usize,usize);

#[derive(Clone,Copy,Debug)]
pub struct FatTree
{
	pub k: usize,
}

impl FatTree
{
	///`k` must be even and at least 2: an odd `k` cannot halve into edge and
	///aggregation switches, which is exactly the invalid-configuration case
	///in §7 kind 1.
	pub fn new(k: usize) -> Result<FatTree,String>
	{
		if k == 0 || k % 2 != 0
		{
			return Err(format!("fat-tree k={} must be even and non-zero", k));
		}
		Ok(FatTree{ k })
	}

	pub fn half(&self) -> usize { self.k / 2 }
	pub fn pods(&self) -> usize { self.k }
	pub fn compute_hosts_per_edge(&self) -> usize { self.half() }
	pub fn core_switches(&self) -> usize { self.half() * self.half() }
	///Total compute hosts addressable by this shape.
	pub fn world_size(&self) -> usize { self.pods() * self.half() * self.half() }

	pub fn unpack(&self, rank: usize) -> Coordinate
	{
		let half = self.half();
		let per_pod = half * half;
		let pod = rank / per_pod;
		let rem = rank % per_pod;
		let edge = rem / half;
		let slot = rem % half;
		(pod, edge, slot)
	}

	pub fn pack(&self, coordinate: Coordinate) -> usize
	{
		let half = self.half();
		let (pod, edge, slot) = coordinate;
		pod * half * half + edge * half + slot
	}

	///2 if the two hosts share an edge switch, 4 if they share a pod but not
	///an edge switch, 6 otherwise (up to the core and back down).
	pub fn distance(&self, ra: usize, rb: usize) -> usize
	{
		if ra == rb { return 0; }
		let (pod_a, edge_a, _) = self.unpack(ra);
		let (pod_b, edge_b, _) = self.unpack(rb);
		if pod_a == pod_b && edge_a == edge_b { 2 }
		else if pod_a == pod_b { 4 }
		else { 6 }
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn rejects_odd_k()
	{
		assert!(FatTree::new(3).is_err());
	}

	#[test]
	fn pack_unpack_roundtrip()
	{
		let ft = FatTree::new(4).unwrap();
		for r in 0..ft.world_size()
		{
			assert_eq!(ft.pack(ft.unpack(r)), r);
		}
	}

	#[test]
	fn distance_tiers()
	{
		let ft = FatTree::new(4).unwrap();
		// k=4: half=2, per_pod=4. rank=0 -> (0,0,0); rank=1 -> (0,0,1); rank=2 -> (0,1,0); rank=4 -> (1,0,0)
		assert_eq!(ft.distance(0,0), 0);
		assert_eq!(ft.distance(0,1), 2);
		assert_eq!(ft.distance(0,2), 4);
		assert_eq!(ft.distance(0,4), 6);
	}
}
