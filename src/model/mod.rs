/*!

The network-characteristics model: topology kind, process placement,
per-tier bandwidth/latency, and the derived [`NetworkCharacteristics::distance`]
and [`NetworkCharacteristics::bisection_bandwidth`] every algorithm and the
optimizer read.

Per the design notes this is a tagged variant over
`{FAT_TREE, TORUS, DRAGONFLY, FLAT}` matched once per entry point rather than
dispatched through a trait object — the hot path (a `distance` call inside a
tight broadcast/allreduce loop) stays branchless after the one match,
unlike the teacher's `Topology` trait which is implemented once per
concrete struct and called through `&dyn Topology`. The teacher's row-major
`CartesianData` packing and its `Dragonfly`'s group/router decomposition are
reused, generalized in [`fat_tree`], [`torus`] and [`dragonfly`].

*/

pub mod fat_tree;
pub mod torus;
pub mod dragonfly;
pub mod flat;

use crate::error::{Error,Result};

///The topology kind as exposed to callers (§3): a label distinct from the
///internal [`Layout`], which additionally carries the shape parameters.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum TopologyKind
{
	FatTree,
	Torus2D,
	Torus3D,
	Dragonfly,
	Flat,
}

impl std::fmt::Display for TopologyKind
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		let name = match self
		{
			TopologyKind::FatTree => "fat_tree",
			TopologyKind::Torus2D => "torus_2d",
			TopologyKind::Torus3D => "torus_3d",
			TopologyKind::Dragonfly => "dragonfly",
			TopologyKind::Flat => "flat",
		};
		write!(f, "{}", name)
	}
}

///Shape parameters supplied at model-construction time (§6: "topology kind
///and shape are supplied at model-construction time, not auto-discovered").
#[derive(Clone,Debug)]
pub enum TopologyConfig
{
	FatTree { k: usize },
	///`sides.len()` must be 2 or 3 to map onto `TORUS_2D`/`TORUS_3D`.
	Torus { sides: Vec<usize> },
	Dragonfly { groups: usize, routers_per_group: usize, hosts_per_router: usize },
	Flat { world_size: usize },
}

#[derive(Debug)]
enum Layout
{
	FatTree(fat_tree::FatTree),
	Torus(torus::Torus),
	Dragonfly(dragonfly::Dragonfly),
	Flat(flat::Flat),
}

///Bandwidth/latency defaults recorded by the measurement harness (§4.B).
///Three tiers for fat-tree and dragonfly (innermost to outermost); torus and
///flat only ever populate their first tier, the rest mirror it so that
///`link_bandwidth`/`link_latency` never need to special-case a short array.
struct Defaults
{
	bandwidth_mbps: Vec<f64>,
	latency_us: Vec<f64>,
}

fn defaults_for(kind: TopologyKind) -> Defaults
{
	match kind
	{
		TopologyKind::FatTree => Defaults
		{
			bandwidth_mbps: vec![10_000.0, 40_000.0, 40_000.0],
			latency_us: vec![1.0, 2.0, 5.0],
		},
		TopologyKind::Dragonfly => Defaults
		{
			// Host-router links run at compute-edge speed; intra-group links are
			// the fast common case; the single global link per inter-group hop is
			// the narrower, higher-latency tier, mirroring the teacher's
			// `dragonfly_size` distinction between local and global ports.
			bandwidth_mbps: vec![10_000.0, 40_000.0, 10_000.0],
			latency_us: vec![1.0, 1.0, 5.0],
		},
		TopologyKind::Torus2D | TopologyKind::Torus3D => Defaults
		{
			bandwidth_mbps: vec![10_000.0],
			latency_us: vec![1.0],
		},
		TopologyKind::Flat => Defaults
		{
			bandwidth_mbps: vec![10_000.0],
			latency_us: vec![1.0],
		},
	}
}

///A value object built once per process group (§3). Immutable after
///construction; a fresh measurement pass produces a fresh
///`NetworkCharacteristics` rather than mutating this one in place, keeping
///the "read-only after construction" guarantee in §5 trivially true.
#[derive(Debug)]
pub struct NetworkCharacteristics
{
	kind: TopologyKind,
	world_size: usize,
	layout: Layout,
	link_bandwidth_mbps: Vec<f64>,
	link_latency_us: Vec<f64>,
	///Tiers the measurement harness flagged as violating the monotonicity
	///invariant (§3) or otherwise low-confidence (§7 kind 5). Not fatal.
	low_confidence_tiers: Vec<bool>,
}

impl NetworkCharacteristics
{
	///Validate `config` and build the model. Rejects the invalid-configuration
	///cases of §7 kind 1: odd fat-tree `k`, a zero-length torus dimension, a
	///torus with a dimensionality other than 2 or 3, or a dragonfly with any
	///zero shape parameter.
	pub fn new(config: TopologyConfig) -> Result<NetworkCharacteristics>
	{
		let (kind, world_size, layout) = match config
		{
			TopologyConfig::FatTree { k } =>
			{
				let ft = fat_tree::FatTree::new(k).map_err(Error::Configuration)?;
				let world_size = ft.world_size();
				(TopologyKind::FatTree, world_size, Layout::FatTree(ft))
			},
			TopologyConfig::Torus { sides } =>
			{
				let kind = match sides.len()
				{
					2 => TopologyKind::Torus2D,
					3 => TopologyKind::Torus3D,
					d => return Err(Error::Configuration(format!("torus must have 2 or 3 dimensions, got {}", d))),
				};
				let torus = torus::Torus::new(sides).map_err(Error::Configuration)?;
				let world_size = torus.world_size();
				(kind, world_size, Layout::Torus(torus))
			},
			TopologyConfig::Dragonfly { groups, routers_per_group, hosts_per_router } =>
			{
				let df = dragonfly::Dragonfly::new(groups, routers_per_group, hosts_per_router).map_err(Error::Configuration)?;
				let world_size = df.world_size();
				(TopologyKind::Dragonfly, world_size, Layout::Dragonfly(df))
			},
			TopologyConfig::Flat { world_size } =>
			{
				let flat = flat::Flat::new(world_size).map_err(Error::Configuration)?;
				(TopologyKind::Flat, world_size, Layout::Flat(flat))
			},
		};
		let defaults = defaults_for(kind);
		Ok(NetworkCharacteristics
		{
			kind,
			world_size,
			layout,
			low_confidence_tiers: vec![false; defaults.bandwidth_mbps.len()],
			link_bandwidth_mbps: defaults.bandwidth_mbps,
			link_latency_us: defaults.latency_us,
		})
	}

	pub fn topology_kind(&self) -> TopologyKind { self.kind }
	pub fn world_size(&self) -> usize { self.world_size }

	///Hop-count distance under the topology's own routing. Symmetric and
	///zero iff `ra == rb`, per the invariant in §3.
	pub fn distance(&self, ra: usize, rb: usize) -> usize
	{
		match &self.layout
		{
			Layout::FatTree(t) => t.distance(ra, rb),
			Layout::Torus(t) => t.distance(ra, rb),
			Layout::Dragonfly(t) => t.distance(ra, rb),
			Layout::Flat(t) => t.distance(ra, rb),
		}
	}

	///Whether the topology is known to contain a long-diameter, mostly
	///linear structure (torus, or a degenerate chain), which is what steers
	///the broadcast policy towards the pipeline algorithm in §4.D.
	pub fn has_long_diameter_linear_structure(&self) -> bool
	{
		matches!(self.kind, TopologyKind::Torus2D | TopologyKind::Torus3D)
	}

	///Bandwidth of the given tier, in Mbps. Out-of-range tiers clamp to the
	///outermost known tier rather than panicking, since a caller iterating
	///tiers by index has no other signal for "there is no narrower tier".
	pub fn link_bandwidth(&self, tier: usize) -> f64
	{
		*self.link_bandwidth_mbps.get(tier).unwrap_or_else(|| self.link_bandwidth_mbps.last().unwrap())
	}

	///Latency of the given tier, in microseconds. Same clamping as
	///[`Self::link_bandwidth`].
	pub fn link_latency(&self, tier: usize) -> f64
	{
		*self.link_latency_us.get(tier).unwrap_or_else(|| self.link_latency_us.last().unwrap())
	}

	pub fn tier_count(&self) -> usize { self.link_bandwidth_mbps.len() }

	///Minimum per-hop latency across tiers, the α the §4.C cost formulas use.
	pub fn alpha_us(&self) -> f64
	{
		self.link_latency_us.iter().cloned().fold(f64::INFINITY, f64::min)
	}

	///Inverse of the maximum per-tier bandwidth, the β the §4.C cost formulas
	///use, in microseconds per byte.
	pub fn beta_us_per_byte(&self) -> f64
	{
		let max_mbps = self.link_bandwidth_mbps.iter().cloned().fold(0.0, f64::max);
		// Mbps -> bytes/us: Mbps*1e6 bits/s / 8 bits/byte / 1e6 us/s = Mbps/8 bytes/us.
		8.0 / max_mbps
	}

	///Minimum aggregate bandwidth across any cut dividing the machine in
	///half: approximated as half the world crossing the narrowest tier,
	///which is the tier any such cut must eventually traverse.
	pub fn bisection_bandwidth(&self) -> f64
	{
		let narrowest = self.link_bandwidth_mbps.iter().cloned().fold(f64::INFINITY, f64::min);
		(self.world_size as f64 / 2.0) * narrowest
	}

	///Record that `tier` was observed to violate the monotonicity invariant,
	///or is otherwise low-confidence (§7 kind 5). Not fatal; just logged and
	///flagged for callers that care to check [`Self::is_tier_low_confidence`].
	pub(crate) fn flag_low_confidence_tier(&mut self, tier: usize)
	{
		if let Some(flag) = self.low_confidence_tiers.get_mut(tier)
		{
			*flag = true;
			log::warn!("tier {} flagged low-confidence on a {} model", tier, self.kind);
		}
	}

	pub fn is_tier_low_confidence(&self, tier: usize) -> bool
	{
		self.low_confidence_tiers.get(tier).copied().unwrap_or(false)
	}

	///Overwrite the measured bandwidth/latency for `tier`, as the
	///measurement harness does once a probe completes. Out-of-range tiers
	///are ignored: this model only ever has as many tiers as its topology
	///kind defines.
	pub(crate) fn record_measured_tier(&mut self, tier: usize, bandwidth_mbps: f64, latency_us: f64)
	{
		if let Some(bw) = self.link_bandwidth_mbps.get_mut(tier) { *bw = bandwidth_mbps; }
		if let Some(lat) = self.link_latency_us.get_mut(tier) { *lat = latency_us; }
		let monotone = self.link_latency_us.windows(2).all(|w| w[0] <= w[1]);
		if !monotone
		{
			self.flag_low_confidence_tier(tier);
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn rejects_odd_fat_tree_k()
	{
		let result = NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 3 });
		assert!(matches!(result, Err(Error::Configuration(_))));
	}

	#[test]
	fn rejects_non_2_or_3_dim_torus()
	{
		let result = NetworkCharacteristics::new(TopologyConfig::Torus{ sides: vec![4] });
		assert!(matches!(result, Err(Error::Configuration(_))));
	}

	#[test]
	fn distance_is_symmetric_and_zero_on_diagonal()
	{
		let model = NetworkCharacteristics::new(TopologyConfig::FatTree{ k: 4 }).unwrap();
		for a in 0..model.world_size()
		{
			assert_eq!(model.distance(a,a), 0);
			for b in 0..model.world_size()
			{
				assert_eq!(model.distance(a,b), model.distance(b,a));
			}
		}
	}

	#[test]
	fn torus_topology_kind_matches_dimensionality()
	{
		let model2d = NetworkCharacteristics::new(TopologyConfig::Torus{ sides: vec![4,4] }).unwrap();
		assert_eq!(model2d.topology_kind(), TopologyKind::Torus2D);
		assert!(model2d.has_long_diameter_linear_structure());
		let model3d = NetworkCharacteristics::new(TopologyConfig::Torus{ sides: vec![4,4,4] }).unwrap();
		assert_eq!(model3d.topology_kind(), TopologyKind::Torus3D);
	}

	#[test]
	fn flat_topology_has_unit_distance()
	{
		let model = NetworkCharacteristics::new(TopologyConfig::Flat{ world_size: 6 }).unwrap();
		assert_eq!(model.distance(0,5), 1);
		assert_eq!(model.distance(2,2), 0);
	}
}
