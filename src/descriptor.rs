/*!

The Collective Call Descriptor (§3): the ephemeral, per-call parameters the
optimizer uses to pick an algorithm. Unlike [`crate::model::NetworkCharacteristics`],
a descriptor lives for exactly one collective call.

*/

use crate::reduction::ReductionOp;

///Which collective is being invoked.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum OpKind
{
	Broadcast,
	Reduce,
	Allreduce,
	Allgather,
}

impl std::fmt::Display for OpKind
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		let name = match self
		{
			OpKind::Broadcast => "broadcast",
			OpKind::Reduce => "reduce",
			OpKind::Allreduce => "allreduce",
			OpKind::Allgather => "allgather",
		};
		write!(f, "{}", name)
	}
}

///The parameters of one collective call, built fresh at every call site.
#[derive(Clone,Copy,Debug)]
pub struct CallDescriptor
{
	pub op_kind: OpKind,
	///Present for `Broadcast` and `Reduce`; ignored otherwise.
	pub root: Option<usize>,
	pub count: usize,
	pub datatype_size: usize,
	///Present for `Reduce` and `Allreduce`; ignored otherwise.
	pub reduction_op: Option<ReductionOp>,
	pub world_size: usize,
}

impl CallDescriptor
{
	///Total message size in bytes, `count * datatype_size`. Returns `None`
	///on overflow, which the optimizer turns into
	///[`crate::error::Error::SizeMismatch`] (§7 kind 2).
	pub fn message_bytes(&self) -> Option<usize>
	{
		self.count.checked_mul(self.datatype_size)
	}
}
