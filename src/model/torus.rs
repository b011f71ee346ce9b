/*!

Placement and distance for a d-dimensional torus, per §4.B.

Row-major coordinate packing, directly grounded on the teacher's
`CartesianData` (`src/topology/cartesian.rs`): `sides` gives the extent of
each dimension and `size` their product. Distance is Manhattan with
per-dimension wraparound, the same computation the teacher's `Torus`
performs through `coordinated_routing_record`.

*/

///A rectangular torus shape: `sides[i]` is the extent of dimension `i`.
#[derive(Clone,Debug)]
pub struct Torus
{
	pub sides: Vec<usize>,
	size: usize,
}

impl Torus
{
	///Every dimension must have a strictly positive extent: a zero-length
	///dimension is the invalid-configuration case of §7 kind 1.
	pub fn new(sides: Vec<usize>) -> Result<Torus,String>
	{
		if sides.is_empty()
		{
			return Err("torus must have at least one dimension".to_string());
		}
		if sides.iter().any(|&s| s == 0)
		{
			return Err(format!("torus dimensions must be non-zero, got {:?}", sides));
		}
		let size = sides.iter().product();
		Ok(Torus{ sides, size })
	}

	pub fn world_size(&self) -> usize { self.size }

	pub fn unpack(&self, mut rank: usize) -> Vec<usize>
	{
		let mut coordinate = Vec::with_capacity(self.sides.len());
		for &side in self.sides.iter()
		{
			coordinate.push(rank % side);
			rank /= side;
		}
		coordinate
	}

	pub fn pack(&self, coordinate: &[usize]) -> usize
	{
		let mut rank = 0;
		let mut stride = 1;
		for (i, &side) in self.sides.iter().enumerate()
		{
			rank += coordinate[i] * stride;
			stride *= side;
		}
		rank
	}

	///Manhattan distance with wraparound: `Σ min(|Δi|, Di−|Δi|)`.
	pub fn distance(&self, ra: usize, rb: usize) -> usize
	{
		let a = self.unpack(ra);
		let b = self.unpack(rb);
		self.sides.iter().zip(a.iter().zip(b.iter())).map(|(&side,(&x,&y))|
		{
			let delta = if x > y { x - y } else { y - x };
			delta.min(side - delta)
		}).sum()
	}
}
