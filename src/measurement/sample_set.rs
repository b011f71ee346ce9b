/*!

An unordered collection of measured doubles with the statistics the
Measurement Harness's Statistical Analyzer needs (§3, §4.A): mean, median,
stddev, variance, a 95% confidence half-width, and Tukey-fence outlier
detection/removal.

*/

///An unordered sample of `f64` measurements (latencies, bandwidths, …).
#[derive(Clone,Debug,Default)]
pub struct SampleSet
{
	values: Vec<f64>,
}

impl SampleSet
{
	pub fn new() -> SampleSet { SampleSet{ values: Vec::new() } }

	pub fn add(&mut self, value: f64) { self.values.push(value); }
	pub fn clear(&mut self) { self.values.clear(); }
	pub fn len(&self) -> usize { self.values.len() }
	pub fn is_empty(&self) -> bool { self.values.is_empty() }
	pub fn values(&self) -> &[f64] { &self.values }

	pub fn mean(&self) -> f64
	{
		if self.values.is_empty() { return 0.0; }
		self.values.iter().sum::<f64>() / self.values.len() as f64
	}

	fn sorted(&self) -> Vec<f64>
	{
		let mut v = self.values.clone();
		v.sort_by(|a,b| a.partial_cmp(b).expect("NaN in sample set"));
		v
	}

	pub fn median(&self) -> f64
	{
		if self.values.is_empty() { return 0.0; }
		let sorted = self.sorted();
		let n = sorted.len();
		if n % 2 == 1 { sorted[n/2] } else { (sorted[n/2 - 1] + sorted[n/2]) / 2.0 }
	}

	pub fn min(&self) -> f64
	{
		self.values.iter().cloned().fold(f64::INFINITY, f64::min)
	}

	pub fn max(&self) -> f64
	{
		self.values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
	}

	///Bessel-corrected sample variance. Zero for fewer than 2 samples.
	pub fn variance(&self) -> f64
	{
		let n = self.values.len();
		if n < 2 { return 0.0; }
		let mean = self.mean();
		self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
	}

	///Bessel-corrected sample standard deviation.
	pub fn stddev(&self) -> f64
	{
		self.variance().sqrt()
	}

	///Half-width of the 95% confidence interval of the mean, `1.96·σ/√n`.
	///Zero for an empty sample, matching the "never raises" failure
	///semantics of §4.A.
	pub fn confidence_95_half_width(&self) -> f64
	{
		let n = self.values.len();
		if n == 0 { return 0.0; }
		1.96 * self.stddev() / (n as f64).sqrt()
	}

	///Crude normality check: `|skew| < 1 ∧ |kurtosis - 3| < 2`, only
	///meaningful with at least 20 samples (§4.A).
	pub fn looks_normal(&self) -> bool
	{
		let n = self.values.len();
		if n < 20 { return false; }
		let mean = self.mean();
		let sigma = self.stddev();
		if sigma == 0.0 { return false; }
		let m3 = self.values.iter().map(|v| ((v - mean)/sigma).powi(3)).sum::<f64>() / n as f64;
		let m4 = self.values.iter().map(|v| ((v - mean)/sigma).powi(4)).sum::<f64>() / n as f64;
		m3.abs() < 1.0 && (m4 - 3.0).abs() < 2.0
	}

	///Tukey-fence quartiles `(q1, q3)`. For `n >= 8` this follows the source
	///exactly (`sorted[n/4]`, `sorted[3n/4]`); for smaller samples the index
	///is interpolated linearly between its two nearest integer positions
	///instead of truncating, per the REDESIGN FLAGS note on degenerate IQR
	///values at small n.
	fn quartiles(sorted: &[f64]) -> (f64,f64)
	{
		let n = sorted.len();
		if n < 8
		{
			(interpolated_quantile(sorted, 0.25), interpolated_quantile(sorted, 0.75))
		}
		else
		{
			(sorted[n/4], sorted[3*n/4])
		}
	}

	///Interquartile range, `q3 - q1`.
	pub fn interquartile_range(&self) -> f64
	{
		if self.values.len() < 2 { return 0.0; }
		let sorted = self.sorted();
		let (q1, q3) = Self::quartiles(&sorted);
		q3 - q1
	}

	///Tukey fences at threshold multiplier `k`: `[q1-k*iqr, q3+k*iqr]`.
	fn fences(&self, k: f64) -> (f64,f64)
	{
		let sorted = self.sorted();
		let (q1, q3) = Self::quartiles(&sorted);
		let iqr = q3 - q1;
		(q1 - k*iqr, q3 + k*iqr)
	}

	///Values outside the Tukey fences at threshold `k` (default 1.5).
	pub fn outliers(&self, k: f64) -> Vec<f64>
	{
		if self.values.len() < 2 { return Vec::new(); }
		let (low, high) = self.fences(k);
		self.values.iter().cloned().filter(|&v| v < low || v > high).collect()
	}

	///Remove outliers at threshold `k` in place. Returns `true` and replaces
	///the sample set iff at least one outlier was removed, so repeated calls
	///at the same `k` become a no-op (idempotent) once the set is clean.
	pub fn remove_outliers(&mut self, k: f64) -> bool
	{
		if self.values.len() < 2 { return false; }
		let (low, high) = self.fences(k);
		let kept: Vec<f64> = self.values.iter().cloned().filter(|&v| v >= low && v <= high).collect();
		if kept.len() == self.values.len() { return false; }
		self.values = kept;
		true
	}
}

///Linear interpolation between the two sample positions nearest `quantile`
///(0.0..=1.0), using the same `n/4`-style indexing as the non-interpolated
///path but splitting the fractional remainder across the two neighbours.
fn interpolated_quantile(sorted: &[f64], quantile: f64) -> f64
{
	let n = sorted.len();
	if n == 0 { return 0.0; }
	if n == 1 { return sorted[0]; }
	let position = quantile * (n - 1) as f64;
	let lower = position.floor() as usize;
	let upper = position.ceil() as usize;
	if lower == upper { return sorted[lower]; }
	let fraction = position - lower as f64;
	sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
}

#[cfg(test)]
mod tests
{
	use super::*;

	fn set_of(values: &[f64]) -> SampleSet
	{
		let mut s = SampleSet::new();
		for &v in values { s.add(v); }
		s
	}

	#[test]
	fn mean_and_median_on_odd_and_even_counts()
	{
		let odd = set_of(&[1.0, 2.0, 3.0]);
		assert_eq!(odd.mean(), 2.0);
		assert_eq!(odd.median(), 2.0);
		let even = set_of(&[1.0, 2.0, 3.0, 4.0]);
		assert_eq!(even.mean(), 2.5);
		assert_eq!(even.median(), 2.5);
	}

	#[test]
	fn stddev_bessel_corrected()
	{
		let s = set_of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
		// population variance would be 4.0; Bessel-corrected sample variance is 32/7.
		assert!((s.variance() - 32.0/7.0).abs() < 1e-9);
	}

	#[test]
	fn empty_set_never_panics()
	{
		let s = SampleSet::new();
		assert_eq!(s.mean(), 0.0);
		assert_eq!(s.median(), 0.0);
		assert_eq!(s.stddev(), 0.0);
		assert_eq!(s.confidence_95_half_width(), 0.0);
		assert!(s.outliers(1.5).is_empty());
	}

	#[test]
	fn removes_the_documented_outlier()
	{
		let mut s = set_of(&[10.0,11.0,12.0,11.0,10.0,12.0,100.0]);
		assert!(s.remove_outliers(1.5));
		assert_eq!(s.values(), &[10.0,11.0,12.0,11.0,10.0,12.0]);
	}

	#[test]
	fn outlier_removal_is_idempotent()
	{
		let mut s = set_of(&[10.0,11.0,12.0,11.0,10.0,12.0,100.0]);
		assert!(s.remove_outliers(1.5));
		assert!(!s.remove_outliers(1.5));
	}
}
