/*!

A named-section stopwatch (§3): at most one section active at a time, with
start/stop pairs accumulating into a per-name total.

*/

use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug)]
pub struct Timer
{
	accumulated_ms: HashMap<String,f64>,
	active: Option<(String,Instant)>,
}

impl Timer
{
	pub fn new() -> Timer
	{
		Timer{ accumulated_ms: HashMap::new(), active: None }
	}

	///Begin timing `section`. Panics if another section is already active:
	///this is a programming-error invariant, not a user-facing condition.
	pub fn start(&mut self, section: &str)
	{
		assert!(self.active.is_none(), "timer section {:?} started while {:?} is still active", section, self.active.as_ref().map(|(s,_)| s));
		self.active = Some((section.to_string(), Instant::now()));
	}

	///Stop the currently active section, accumulating its elapsed time.
	///Panics if no section is active.
	pub fn stop(&mut self)
	{
		let (section, started) = self.active.take().expect("timer stopped with no active section");
		let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
		*self.accumulated_ms.entry(section).or_insert(0.0) += elapsed_ms;
	}

	pub fn accumulated_ms(&self, section: &str) -> f64
	{
		self.accumulated_ms.get(section).copied().unwrap_or(0.0)
	}

	pub fn is_active(&self) -> bool { self.active.is_some() }
}

impl Default for Timer
{
	fn default() -> Timer { Timer::new() }
}
