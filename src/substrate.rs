/*!

The message-passing substrate consumed by this crate.

§6 of the design specifies the substrate as an external collaborator: this
module only defines the trait boundary (`rank`, `size`, `send`, `recv`,
`barrier`, `wtime`, `reduce_local`) plus one concrete, in-process
implementation — [`MockSubstrate`] — used by the test harness and the
correctness oracle. A production embedding is expected to implement
[`Substrate`] over its own MPI-like library; this crate never reaches for a
global handle, unlike the teacher's single global simulation state.

*/

use std::cell::RefCell;
use std::collections::{HashMap,VecDeque};
use std::sync::mpsc::{self,Receiver,Sender};
use std::sync::{Arc,Barrier};
use std::time::Instant;

use crate::error::{Result,SubstrateError};
use crate::reduction::ReductionOp;

///A message tag. Each algorithm round uses a distinct tag so that messages
///of different rounds on the same (src,dst,communicator) are never confused,
///per the tag discipline in §5.
pub type Tag = u32;

///The minimum contract this crate requires of a message-passing layer.
///Every method is blocking: `send`/`recv`/`barrier` suspend until the peer
///or group matches, as specified in §5.
pub trait Substrate
{
	///This process's rank within the communicator.
	fn rank(&self) -> usize;
	///Number of ranks in the communicator.
	fn size(&self) -> usize;
	///Blocking send of `buf` to `dst`, tagged `tag`.
	fn send(&self, buf: &[f64], dst: usize, tag: Tag) -> Result<()>;
	///Blocking receive into `buf` from `src`, tagged `tag`. `buf` is resized
	///implicitly by the caller: the slice length is the expected count.
	fn recv(&self, buf: &mut [f64], src: usize, tag: Tag) -> Result<()>;
	///Blocks until every rank in the communicator has called `barrier`.
	fn barrier(&self);
	///Wall-clock time in seconds, at least microsecond resolution.
	fn wtime(&self) -> f64;
	///Apply `op` elementwise, combining `src` into `dst`, without any
	///network traffic. `dst` and `src` must have equal length.
	fn reduce_local(&self, op: ReductionOp, src: &[f64], dst: &mut [f64])
	{
		op.apply(dst, src);
	}
}

struct Envelope
{
	tag: Tag,
	payload: Vec<f64>,
}

///An in-process software switch: every [`MockSubstrate`] handle it produces
///shares a set of channels so that sends on one handle are observed by
///`recv` on the matching handle, synchronously, without any real network.
///Intended for tests and for the correctness oracle, analogous to the way
///the teacher's `tests/common` module assembles an entire `Simulation` from
///in-memory configuration rather than an external process group.
pub struct Switch;

impl Switch
{
	///Build `world_size` handles, one per rank, all belonging to the same
	///communicator. Handles are meant to be moved one-per-thread and driven
	///independently; `barrier`/`send`/`recv` then provide the actual
	///cross-rank synchronization.
	pub fn new(world_size: usize) -> Vec<MockSubstrate>
	{
		let (senders, receivers): (Vec<Sender<(usize,Envelope)>>, Vec<Receiver<(usize,Envelope)>>) =
			(0..world_size).map(|_| mpsc::channel()).unzip();
		let barrier = Arc::new(Barrier::new(world_size.max(1)));
		let start = Arc::new(Instant::now());
		receivers.into_iter().enumerate().map(|(rank,inbox)| MockSubstrate{
			rank,
			world_size,
			senders: senders.clone(),
			inbox,
			pending: RefCell::new(HashMap::new()),
			barrier: Arc::clone(&barrier),
			start: Arc::clone(&start),
		}).collect()
	}
}

///One rank's view of an in-process [`Switch`].
pub struct MockSubstrate
{
	rank: usize,
	world_size: usize,
	senders: Vec<Sender<(usize,Envelope)>>,
	inbox: Receiver<(usize,Envelope)>,
	///Messages received out of tag order relative to the caller's current
	///`recv`, buffered until a matching `recv(src,tag)` claims them. Keyed
	///by the sender's rank and the envelope's tag. `RefCell` because every
	///algorithm in [`crate::algorithms`] holds only `&MockSubstrate`.
	pending: RefCell<HashMap<(usize,Tag),VecDeque<Vec<f64>>>>,
	barrier: Arc<Barrier>,
	start: Arc<Instant>,
}

impl Substrate for MockSubstrate
{
	fn rank(&self) -> usize { self.rank }
	fn size(&self) -> usize { self.world_size }

	fn send(&self, buf: &[f64], dst: usize, tag: Tag) -> Result<()>
	{
		self.senders[dst].send((self.rank, Envelope{ tag, payload: buf.to_vec() }))
			.map_err(|e| crate::error::Error::Substrate(SubstrateError::new(ChannelFailure(e.to_string()))))
	}

	fn recv(&self, buf: &mut [f64], src: usize, tag: Tag) -> Result<()>
	{
		if let Some(payload) = self.take_pending(src, tag)
		{
			buf.copy_from_slice(&payload);
			return Ok(());
		}
		loop
		{
			let (from, envelope) = self.inbox.recv()
				.map_err(|e| crate::error::Error::Substrate(SubstrateError::new(ChannelFailure(e.to_string()))))?;
			if from == src && envelope.tag == tag
			{
				buf.copy_from_slice(&envelope.payload);
				return Ok(());
			}
			self.pending.borrow_mut().entry((from,envelope.tag)).or_default().push_back(envelope.payload);
		}
	}

	fn barrier(&self)
	{
		self.barrier.wait();
	}

	fn wtime(&self) -> f64
	{
		self.start.elapsed().as_secs_f64()
	}
}

impl MockSubstrate
{
	fn take_pending(&self, src: usize, tag: Tag) -> Option<Vec<f64>>
	{
		self.pending.borrow_mut().get_mut(&(src,tag)).and_then(VecDeque::pop_front)
	}
}

#[derive(Debug)]
struct ChannelFailure(String);
impl std::fmt::Display for ChannelFailure
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f,"{}",self.0) }
}
impl std::error::Error for ChannelFailure {}
