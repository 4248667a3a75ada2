#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// `DeviceVariant` selects which perfmon control device a session talks to.
pub enum DeviceVariant {
    /// `Core` exposes the core-local PMCs of the CPU executing the caller.
    ///
    /// Counter state is per core: pin the sampling thread (see
    /// [`affinity`]) to measure a particular core.
    ///
    /// [`affinity`]: affinity/index.html
    Core,

    /// `Uncore` exposes counters shared between the cores of a cluster.
    Uncore,
}

impl DeviceVariant {
    /// The device node the kernel creates for this variant.
    pub fn default_path(&self) -> &'static str {
        match self {
            DeviceVariant::Core => "/dev/perfmon_core",
            DeviceVariant::Uncore => "/dev/perfmon_uncore",
        }
    }

    /// The environment variable that overrides [`default_path`].
    ///
    /// [`default_path`]: #method.default_path
    pub fn env_var(&self) -> &'static str {
        match self {
            DeviceVariant::Core => "PERFMON_CORE_DEVICE",
            DeviceVariant::Uncore => "PERFMON_UNCORE_DEVICE",
        }
    }
}

impl Default for DeviceVariant {
    fn default() -> Self {
        DeviceVariant::Core
    }
}
