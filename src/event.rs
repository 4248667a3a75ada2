/// A named hardware event bound to a counter slot.
///
/// Events are registered with [`Session::register_event`] and influence every
/// sample taken after registration. The facility offers no way to list or
/// remove them.
///
/// ```
/// use perfmon::Event;
///
/// let cycles = Event::new("cycles", 0x02, 2);
/// assert_eq!(cycles.counter_slot, 2);
/// ```
///
/// [`Session::register_event`]: struct.Session.html#method.register_event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    /// Event name, as known to the facility.
    pub name: String,
    /// Hardware event selector.
    pub number: u64,
    /// Counter the event is bound to.
    pub counter_slot: u16,
}

impl Event {
    #[allow(missing_docs)]
    pub fn new(name: impl Into<String>, number: u64, counter_slot: u16) -> Self {
        Self {
            name: name.into(),
            number,
            counter_slot,
        }
    }
}
