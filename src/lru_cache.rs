/*!

A small bounded LRU cache (§4.D, §9 Design Notes: "bounded LRU keyed on
discretized call descriptor"). Hand-rolled rather than pulled from a crate:
the pack has no ecosystem LRU dependency to reach for, the same situation
[`crate::matrix::Matrix`] is in for its N×N table.

*/

use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::Hash;

///A fixed-capacity cache evicting the least-recently-used entry once full.
///`K` must be cheap to clone: it is stored both in the lookup map and in the
///recency queue.
pub struct LruCache<K,V>
{
	capacity: usize,
	map: HashMap<K,V>,
	recency: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K,V>
{
	///Panics if `capacity` is zero: a zero-capacity cache can never hold an
	///entry, which is a caller bug, not a runtime condition.
	pub fn new(capacity: usize) -> LruCache<K,V>
	{
		assert!(capacity > 0, "LruCache capacity must be positive");
		LruCache{ capacity, map: HashMap::with_capacity(capacity), recency: VecDeque::with_capacity(capacity) }
	}

	pub fn get(&mut self, key: &K) -> Option<&V>
	{
		if self.map.contains_key(key)
		{
			self.touch(key);
			self.map.get(key)
		}
		else
		{
			None
		}
	}

	///Insert or overwrite `key`, evicting the least-recently-used entry if
	///the cache is at capacity and `key` is new.
	pub fn put(&mut self, key: K, value: V)
	{
		if self.map.contains_key(&key)
		{
			self.map.insert(key.clone(), value);
			self.touch(&key);
			return;
		}
		if self.map.len() >= self.capacity
		{
			if let Some(oldest) = self.recency.pop_front()
			{
				self.map.remove(&oldest);
			}
		}
		self.recency.push_back(key.clone());
		self.map.insert(key, value);
	}

	pub fn len(&self) -> usize { self.map.len() }
	pub fn is_empty(&self) -> bool { self.map.is_empty() }

	fn touch(&mut self, key: &K)
	{
		if let Some(pos) = self.recency.iter().position(|k| k == key)
		{
			let moved = self.recency.remove(pos).expect("position just found above");
			self.recency.push_back(moved);
		}
	}
}
