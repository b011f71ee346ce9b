/*!

The degenerate topology: every pair of ranks is one hop apart. Used both as
a genuine "no known topology" fallback and as the baseline the segment-count
cost model in §4.C item 3 falls back to (`for flat assumption, S ≈ …`).

*/

#[derive(Clone,Copy,Debug)]
pub struct Flat
{
	pub world_size: usize,
}

impl Flat
{
	pub fn new(world_size: usize) -> Result<Flat,String>
	{
		if world_size == 0
		{
			return Err("flat topology must have at least one rank".to_string());
		}
		Ok(Flat{ world_size })
	}

	pub fn distance(&self, ra: usize, rb: usize) -> usize
	{
		if ra == rb { 0 } else { 1 }
	}
}
