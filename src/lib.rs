#![warn(missing_docs)]

//! `perfmon-rs` provides a safe abstraction for reading the Performance
//! Monitor Counters of Apple Silicon CPUs through the XNU [`perfmon`] control
//! devices, and for exercising the ARMv8.3 Pointer Authentication (PAC)
//! instructions.
//!
//! PMCs are part of the CPU hardware and count micro-architectural events such
//! as cycles, retired instructions, cache misses or branch mispredictions. XNU
//! exposes the core-local counters as `/dev/perfmon_core` and the counters
//! shared by a cluster as `/dev/perfmon_uncore`. A [`Session`] walks the
//! device protocol:
//!
//! 1. discover the [`Layout`] (registers per unit, number of units),
//! 2. negotiate a [`Spec`],
//! 3. list the register names ([`RegisterCatalog`]),
//! 4. optionally bind [`Event`]s to counter slots,
//! 5. take as many [`SampleMatrix`] snapshots as needed.
//!
//! ```no_run
//! use perfmon::*;
//!
//! let mut session = SessionConfig::default()
//!     .variant(DeviceVariant::Core)
//!     .open()?;
//!
//! session.get_layout()?;
//! session.negotiate(Spec::default())?;
//! let pmc0 = session.list_registers()?.index_of("PMC0").unwrap();
//!
//! let before = session.sample()?;
//! let after = session.sample()?;
//! println!("cycles: {:?}", after.delta(&before, 0, pmc0));
//! #
//! # Ok::<(), error::Error>(())
//! ```
//!
//! The request codes and argument layouts of the devices are supplied by a
//! [`ControlVocabulary`], and the [`simulated`] module provides an in-memory
//! device speaking the same vocabulary.
//!
//! The [`pac`] module signs and authenticates pointers, and
//! [`current_core`] reads the number of the executing core. Both go through a
//! [`HardwareCapability`]: [`Native`] emits the instructions on `aarch64`,
//! [`Simulated`] models them in software.
//!
//! [`perfmon`]: https://github.com/apple-oss-distributions/xnu
//! [`Session`]: struct.Session.html
//! [`Layout`]: struct.Layout.html
//! [`Spec`]: struct.Spec.html
//! [`RegisterCatalog`]: struct.RegisterCatalog.html
//! [`Event`]: struct.Event.html
//! [`SampleMatrix`]: struct.SampleMatrix.html
//! [`ControlVocabulary`]: struct.ControlVocabulary.html
//! [`simulated`]: simulated/index.html
//! [`pac`]: pac/index.html
//! [`current_core`]: fn.current_core.html
//! [`HardwareCapability`]: hardware/trait.HardwareCapability.html
//! [`Native`]: hardware/struct.Native.html
//! [`Simulated`]: hardware/struct.Simulated.html

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate libc;

pub mod error;

mod vocabulary;
pub use self::vocabulary::{ioc, ControlCall, ControlVocabulary, EventFormat, LayoutFormat, SpecFormat};

mod variant;
pub use self::variant::DeviceVariant;

mod layout;
pub use self::layout::{Layout, Spec};

mod event;
pub use self::event::Event;

mod catalog;
pub use self::catalog::RegisterCatalog;

mod sample;
pub use self::sample::SampleMatrix;

mod device;
pub use self::device::{ControlDevice, DeviceFile};

mod session;
pub use self::session::Session;

mod config;
pub use self::config::SessionConfig;

pub mod simulated;

#[cfg(target_arch = "aarch64")]
mod asm;
#[cfg(not(target_arch = "aarch64"))]
mod stubs;

pub mod hardware;
pub mod pac;

mod core_id;
pub use self::core_id::{current_core, CORE_ID_MASK};

pub mod affinity;
