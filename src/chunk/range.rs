/// Splits an iterator into consecutive runs of at most `size` items.
///
/// Meant for [`process_many`](crate::pipeline::chain::PipelineBuilder::process_many)
/// workers that regroup what an upstream `group` or `batch` stage emitted:
///
/// ```
/// use flowpipe::chunk::range::RangeGroupExt;
///
/// let runs: Vec<Vec<u32>> = (1..=7).group_by_range(3).collect();
/// assert_eq!(runs, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
/// ```
pub trait RangeGroupExt: Iterator + Sized {
    /// A `size` of 0 is treated as 1.
    fn group_by_range(self, size: usize) -> Ranges<Self> {
        Ranges {
            inner: self,
            size: size.max(1),
        }
    }
}

impl<I: Iterator> RangeGroupExt for I {}

pub struct Ranges<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Ranges<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.inner.next()?;
        let mut run = Vec::with_capacity(self.size);
        run.push(first);
        run.extend(self.inner.by_ref().take(self.size - 1));
        Some(run)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.inner.size_hint();
        (
            lower.div_ceil(self.size),
            upper.map(|upper| upper.div_ceil(self.size)),
        )
    }
}
