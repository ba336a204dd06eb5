//! Derived image statistics built on the operator table.

use ndops_view::{AnyView, StridedView};

use crate::ops::Ops;
use crate::signature::{Arg, Captures};
use crate::template::Template;
use crate::KernelError;

const HISTOGRAM_SOURCE: &str = "
var x = data[...];
if (x >= lo && x <= hi) {
    var k = floor((x - lo) / width);
    if (k >= nbins) k = nbins - 1;
    counts[k] += 1;
}
";

pub(crate) fn histogram_template() -> crate::Result<Template> {
    Template::parse("histogram", &["counts", "data"], HISTOGRAM_SOURCE)
}

/// Bin counts over `[min, max]` in steps of `width`.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub counts: StridedView<'static, i32>,
    pub min: f64,
    pub max: f64,
    pub width: f64,
    pub nbins: usize,
}

impl Histogram {
    /// Lower edge of bin `k`.
    pub fn bin_start(&self, k: usize) -> f64 {
        self.min + k as f64 * self.width
    }
}

/// Sum, mean and median of every slice across one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub sum: Vec<f64>,
    pub avg: Vec<f64>,
    pub med: Vec<f64>,
}

fn median_of(mut values: Vec<f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

impl Ops {
    /// Median of the logical elements; NaN when empty.
    ///
    /// Works on a copy, so the source is never reordered.
    pub fn median<'a>(&self, view: impl Into<AnyView<'a>>) -> f64 {
        median_of(view.into().to_f64_vec())
    }

    /// Root mean square; NaN when empty.
    pub fn rms<'a>(&self, view: impl Into<AnyView<'a>>) -> crate::Result<f64> {
        let view = view.into();
        if view.is_empty() {
            return Ok(f64::NAN);
        }
        Ok(self.norm2(&view)? / (view.len() as f64).sqrt())
    }

    /// Count the elements of `view` falling in each bin of `[min, max]`.
    ///
    /// Bin `k` covers `[min + k*width, min + (k+1)*width)`; `max` itself
    /// lands in the last bin. NaN and out-of-range elements are ignored.
    pub fn histogram<'a>(
        &self,
        view: impl Into<AnyView<'a>>,
        width: f64,
        min: f64,
        max: f64,
    ) -> crate::Result<Histogram> {
        if !(width > 0.0) || !width.is_finite() {
            return Err(KernelError::InvalidHistogram(format!(
                "bin width must be positive and finite, got {}",
                width
            )));
        }
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(KernelError::InvalidHistogram(format!(
                "invalid range [{}, {}]",
                min, max
            )));
        }
        let bins = ((max - min) / width).floor() + 1.0;
        if bins > i32::MAX as f64 {
            return Err(KernelError::InvalidHistogram(format!("{} bins", bins)));
        }
        let nbins = bins as usize;

        let counts = StridedView::<i32>::zeros(&[nbins]);
        let captures = Captures::new()
            .with("lo", min)
            .with("hi", max)
            .with("width", width)
            .with("nbins", nbins as f64);
        self.histogram_operator()?
            .call_with(&captures, &[Arg::from(&counts), Arg::from(view.into())])?;
        tracing::trace!(nbins, width, "histogram");
        Ok(Histogram {
            counts,
            min,
            max,
            width,
            nbins,
        })
    }

    /// Reduce every slice orthogonal to `axis`.
    ///
    /// Entry `c` of each vector describes the slice with `axis` fixed at `c`.
    pub fn projection<'a>(
        &self,
        view: impl Into<AnyView<'a>>,
        axis: usize,
    ) -> crate::Result<Projection> {
        let view = view.into();
        let rank = view.ndim();
        if axis >= rank {
            return Err(KernelError::InvalidAxis { axis, rank });
        }
        let n = view.dims()[axis];
        let mut out = Projection {
            sum: Vec::with_capacity(n),
            avg: Vec::with_capacity(n),
            med: Vec::with_capacity(n),
        };
        let mut coords = vec![None; rank];
        for c in 0..n {
            coords[axis] = Some(c);
            let slice = view.pick(&coords);
            let sum = self.sum(&slice)?;
            let avg = if slice.is_empty() {
                f64::NAN
            } else {
                sum / slice.len() as f64
            };
            out.sum.push(sum);
            out.avg.push(avg);
            out.med.push(median_of(slice.to_f64_vec()));
        }
        Ok(out)
    }
}
