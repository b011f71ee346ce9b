/*!

The persisted performance-report artifact (§6): one CSV row per optimized
collective call, columns `{timestamp, op, root, bytes, participants,
algorithm_chosen, elapsed_us}` in chronological order. Written with plain
`write!`/`writeln!` over a `std::io::Write`, matching the teacher's own
manual CSV emission rather than pulling in a CSV crate the retrieved pack
never reaches for. The core never opens a file itself: the embedding
collaborator supplies the writer.

*/

use std::io::{self,Write};

use crate::descriptor::OpKind;

const HEADER: &str = "timestamp,op,root,bytes,participants,algorithm_chosen,elapsed_us";

///Appends rows to a `std::io::Write` sink. Writes the CSV header once, on
///the first [`PerformanceReport::record`] call, matching the teacher's
///practice of lazily opening its own output files on first use rather than
///at construction.
pub struct PerformanceReport<W: Write>
{
	writer: W,
	header_written: bool,
}

impl<W: Write> PerformanceReport<W>
{
	pub fn new(writer: W) -> PerformanceReport<W>
	{
		PerformanceReport{ writer, header_written: false }
	}

	///Append one row. `root` is blank for collectives without a root
	///(allreduce, allgather). Numeric fields are plain decimal, no
	///locale-dependent formatting, per §6.
	pub fn record(&mut self, op: OpKind, root: Option<usize>, bytes: usize, participants: usize, algorithm_chosen: &str, elapsed_us: f64) -> io::Result<()>
	{
		if !self.header_written
		{
			writeln!(self.writer, "{}", HEADER)?;
			self.header_written = true;
		}
		let timestamp = chrono::Utc::now().to_rfc3339();
		let root_field = root.map(|r| r.to_string()).unwrap_or_default();
		writeln!(self.writer, "{},{},{},{},{},{},{:.3}", timestamp, op, root_field, bytes, participants, algorithm_chosen, elapsed_us)
	}
}
