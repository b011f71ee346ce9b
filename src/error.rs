/*!

Error types for the collective optimizer.

Errors are split by where they are detected: [`Error::Configuration`] at
[`crate::model::NetworkCharacteristics`] construction, [`Error::SizeMismatch`]
and [`Error::UnsupportedOperator`] at optimizer entry, and [`Error::Substrate`]
whenever the injected message-passing layer reports a failure. Measurement
anomalies (5 in the error-kind enumeration of the design) are deliberately not
an `Error` variant: they are in-band, recorded on the model and logged, never
raised.

*/

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

///All ways a call into this crate can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error
{
	///Rejected at [`crate::model::NetworkCharacteristics`] construction: a
	///topology shape parameter is out of range (odd fat-tree `k`, a zero-length
	///torus dimension, a dragonfly with no routers per group, and so on).
	#[error("invalid topology configuration: {0}")]
	Configuration(String),

	///Rejected at optimizer entry: `count*datatype_size` overflows, or a
	///supplied buffer is smaller than `count` implies.
	#[error("size mismatch: {0}")]
	SizeMismatch(String),

	///A reduction operator was requested that the chosen algorithm cannot
	///carry out (non-commutative op with a ring/tree-halving reduction).
	///Callers normally never observe this: the optimizer falls back to a
	///binomial tree reduce+broadcast instead of returning it (see
	///[`crate::optimizer`]); it is kept as a variant for algorithms invoked
	///directly, bypassing the optimizer's fallback.
	#[error("operator {op:?} is not supported by algorithm {algorithm}")]
	UnsupportedOperator
	{
		op: crate::reduction::ReductionOp,
		algorithm: &'static str,
	},

	///The message-passing substrate reported a failure. Propagated verbatim
	///so the caller can still introspect the native error; never retried.
	#[error("substrate failure: {0}")]
	Substrate(#[from] SubstrateError),
}

///Opaque error returned by a [`crate::substrate::Substrate`] implementation.
///Wraps whatever the concrete substrate produced without attempting to
///interpret it, so callers linking against a real MPI-like library can
///downcast to their native error type if they need to.
#[derive(Debug)]
pub struct SubstrateError(pub Box<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for SubstrateError
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
	{
		write!(f, "{}", self.0)
	}
}

impl std::error::Error for SubstrateError
{
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)>
	{
		Some(self.0.as_ref())
	}
}

impl SubstrateError
{
	pub fn new<E: std::error::Error + Send + Sync + 'static>(error: E) -> SubstrateError
	{
		SubstrateError(Box::new(error))
	}
}
