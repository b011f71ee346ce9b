/*!

The closed set of reduction operators collectives may apply.

Per the design notes this is a tagged union with a local-apply function,
not a trait object: the operator set is fixed and known at compile time,
so there is nothing runtime dispatch would buy over a `match`.

*/

///A reduction operator usable in `reduce`/`allreduce`.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum ReductionOp
{
	Sum,
	Max,
	Min,
	Prod,
}

impl ReductionOp
{
	///Whether the operator is commutative and associative over `f64`, which
	///every algorithm in [`crate::algorithms`] other than the binomial tree
	///assumes. All four operators in the fixed set satisfy this; the method
	///exists so the optimizer's fallback logic (§4.D) reads as a policy
	///decision rather than a tautology, and so a future, non-commutative
	///operator would only need to change this one answer.
	pub fn is_commutative_associative(&self) -> bool
	{
		true
	}

	///Apply the operator elementwise to `dst`, combining in `src`.
	///`dst` and `src` must have equal length; this is an internal invariant
	///upheld by every call site in [`crate::algorithms`], not a user-facing
	///validation point.
	pub fn apply(&self, dst: &mut [f64], src: &[f64])
	{
		debug_assert_eq!(dst.len(), src.len());
		match self
		{
			ReductionOp::Sum => for (d,s) in dst.iter_mut().zip(src.iter()) { *d += *s; },
			ReductionOp::Max => for (d,s) in dst.iter_mut().zip(src.iter()) { if *s > *d { *d = *s; } },
			ReductionOp::Min => for (d,s) in dst.iter_mut().zip(src.iter()) { if *s < *d { *d = *s; } },
			ReductionOp::Prod => for (d,s) in dst.iter_mut().zip(src.iter()) { *d *= *s; },
		}
	}

	///Combine two values, the non-buffer-oriented counterpart of [`Self::apply`].
	pub fn combine(&self, a: f64, b: f64) -> f64
	{
		match self
		{
			ReductionOp::Sum => a + b,
			ReductionOp::Max => a.max(b),
			ReductionOp::Min => a.min(b),
			ReductionOp::Prod => a * b,
		}
	}
}
