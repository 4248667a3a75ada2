use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::device::{ControlDevice, DeviceFile};
use crate::error::Error;
use crate::session::Session;
use crate::variant::DeviceVariant;
use crate::vocabulary::ControlVocabulary;

lazy_static! {
    // Read once so every session in the process agrees on the device nodes.
    static ref ENV_CORE_PATH: Option<OsString> = env::var_os(DeviceVariant::Core.env_var());
    static ref ENV_UNCORE_PATH: Option<OsString> = env::var_os(DeviceVariant::Uncore.env_var());
}

/// Configure a perfmon [`Session`].
///
/// Unless specified, a session opens the core-local device
/// ([`DeviceVariant::Core`]) and speaks the XNU control vocabulary
/// ([`ControlVocabulary::xnu`]).
///
/// The device node is, in order of preference, the path given to [`path`],
/// the path in the variant's environment variable (`PERFMON_CORE_DEVICE` or
/// `PERFMON_UNCORE_DEVICE`), or the variant's default node.
///
/// ```no_run
/// # use perfmon::*;
/// let mut session = SessionConfig::default()
///     .variant(DeviceVariant::Uncore)
///     .open()?;
///
/// let layout = session.get_layout()?;
/// #
/// # Ok::<(), error::Error>(())
/// ```
///
/// [`Session`]: struct.Session.html
/// [`DeviceVariant::Core`]: enum.DeviceVariant.html#variant.Core
/// [`ControlVocabulary::xnu`]: struct.ControlVocabulary.html#method.xnu
/// [`path`]: #method.path
#[derive(Debug, Default, Clone)]
pub struct SessionConfig {
    variant: DeviceVariant,
    path: Option<PathBuf>,
    vocabulary: Option<ControlVocabulary>,
}

impl SessionConfig {
    /// Select the core-local or shared counter device.
    pub fn variant(self, variant: DeviceVariant) -> Self {
        Self { variant, ..self }
    }

    /// Open the device node at `path` instead of the variant's node.
    pub fn path(self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..self
        }
    }

    /// Use the request codes and wire layouts in `vocabulary`.
    pub fn vocabulary(self, vocabulary: ControlVocabulary) -> Self {
        Self {
            vocabulary: Some(vocabulary),
            ..self
        }
    }

    /// The device node this configuration opens.
    pub fn device_path(&self) -> PathBuf {
        if let Some(ref p) = self.path {
            return p.clone();
        }

        let from_env = match self.variant {
            DeviceVariant::Core => ENV_CORE_PATH.clone(),
            DeviceVariant::Uncore => ENV_UNCORE_PATH.clone(),
        };
        resolve_path(self.variant, from_env)
    }

    fn vocabulary_or_default(&self) -> ControlVocabulary {
        self.vocabulary
            .clone()
            .unwrap_or_else(ControlVocabulary::xnu)
    }

    /// Open the configured device node and start a session on it.
    pub fn open(&self) -> Result<Session<DeviceFile>, Error> {
        let device = DeviceFile::open(self.device_path())?;
        Session::with_device(device, self.vocabulary_or_default())
    }

    /// Start a session on an already open `device`, ignoring the configured
    /// path.
    pub fn open_with<D: ControlDevice>(&self, device: D) -> Result<Session<D>, Error> {
        Session::with_device(device, self.vocabulary_or_default())
    }
}

fn resolve_path(variant: DeviceVariant, from_env: Option<OsString>) -> PathBuf {
    match from_env {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => PathBuf::from(variant.default_path()),
    }
}
