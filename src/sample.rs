use crate::layout::Layout;

/// A point-in-time snapshot of every register on every sampling unit.
///
/// Values are stored row-major by unit: entry `[unit][register]` lives at
/// `unit * register_count + register`. The matrix keeps the [`Layout`] it was
/// sized from so it can be reused with [`Session::sample_into`].
///
/// # Counter wraparound
///
/// Hardware counters have a fixed bit width and wrap. A later sample holding a
/// smaller raw value than an earlier one is not an error: the elapsed count is
/// the difference modulo the counter width, which [`delta`] and
/// [`delta_masked`] compute.
///
/// [`Layout`]: struct.Layout.html
/// [`Session::sample_into`]: struct.Session.html#method.sample_into
/// [`delta`]: #method.delta
/// [`delta_masked`]: #method.delta_masked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleMatrix {
    layout: Layout,
    values: Vec<u64>,
}

impl SampleMatrix {
    /// A zeroed matrix sized for `layout`.
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            values: vec![0; layout.sample_len()],
        }
    }

    /// The layout this matrix was sized from.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// `register_count * unit_count`.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value of `register` on `unit`, or `None` when out of range.
    pub fn get(&self, unit: usize, register: usize) -> Option<u64> {
        if unit >= self.layout.unit_count as usize
            || register >= self.layout.register_count as usize
        {
            return None;
        }
        Some(self.values[unit * self.layout.register_count as usize + register])
    }

    /// Every register value of one sampling unit.
    pub fn row(&self, unit: usize) -> Option<&[u64]> {
        if unit >= self.layout.unit_count as usize {
            return None;
        }
        let width = self.layout.register_count as usize;
        self.values.get(unit * width..(unit + 1) * width)
    }

    /// The raw row-major values.
    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u64] {
        &mut self.values
    }

    /// Events counted by `register` on `unit` between `earlier` and `self`,
    /// modulo 2^64.
    ///
    /// ```no_run
    /// # use perfmon::*;
    /// let mut session = SessionConfig::default().open()?;
    /// session.get_layout()?;
    /// let pmc0 = session.list_registers()?.index_of("PMC0").unwrap();
    ///
    /// let before = session.sample()?;
    /// // region of interest
    /// let after = session.sample()?;
    ///
    /// println!("cycles: {:?}", after.delta(&before, 0, pmc0));
    /// # Ok::<(), error::Error>(())
    /// ```
    pub fn delta(&self, earlier: &SampleMatrix, unit: usize, register: usize) -> Option<u64> {
        Some(self.get(unit, register)?.wrapping_sub(earlier.get(unit, register)?))
    }

    /// As [`delta`], for a counter `width_bits` wide.
    ///
    /// [`delta`]: #method.delta
    pub fn delta_masked(
        &self,
        earlier: &SampleMatrix,
        unit: usize,
        register: usize,
        width_bits: u32,
    ) -> Option<u64> {
        let mask = if width_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << width_bits) - 1
        };
        self.delta(earlier, unit, register).map(|d| d & mask)
    }
}
