/// The shape of a perfmon device's register file.
///
/// A `Layout` is only ever produced by a successful discovery call
/// ([`Session::get_layout`]), and sizes every buffer exchanged with the device
/// afterwards.
///
/// [`Session::get_layout`]: struct.Session.html#method.get_layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Number of registers exposed per sampling unit.
    pub register_count: u16,

    /// Number of sampling units (cores or clusters).
    pub unit_count: u16,
}

impl Layout {
    /// The number of counter values in one sample of this layout.
    pub fn sample_len(&self) -> usize {
        self.register_count as usize * self.unit_count as usize
    }
}

/// A set of attributes requested from, or granted by, the device.
///
/// The spec returned by [`Session::negotiate`] is authoritative and may differ
/// from the request.
///
/// [`Session::negotiate`]: struct.Session.html#method.negotiate
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spec {
    /// Attribute bitmask.
    pub attributes: u64,
}

impl Spec {
    /// A spec requesting `attributes`.
    pub fn new(attributes: u64) -> Self {
        Self { attributes }
    }
}
