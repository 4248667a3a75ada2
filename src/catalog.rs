use std::ops::Index;

use crate::vocabulary::decode_name;

/// The ordered register names of a session.
///
/// The index of a name is the register's identity: it addresses the columns
/// of a [`SampleMatrix`] and is stable for the lifetime of the session.
///
/// [`SampleMatrix`]: struct.SampleMatrix.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCatalog {
    names: Vec<String>,
}

impl RegisterCatalog {
    /// Split a `LIST_REGS` reply into `width` sized, NUL-padded names.
    pub(crate) fn decode(buf: &[u8], width: usize) -> Self {
        Self {
            names: buf.chunks_exact(width).map(decode_name).collect(),
        }
    }

    /// The number of registers.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The name of register `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// The index of the first register called `name`.
    ///
    /// ```no_run
    /// # use perfmon::*;
    /// let mut session = SessionConfig::default().open()?;
    /// session.get_layout()?;
    ///
    /// let cycles = session.list_registers()?.index_of("PMC0");
    /// # Ok::<(), error::Error>(())
    /// ```
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Register names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Index<usize> for RegisterCatalog {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.names[index]
    }
}
