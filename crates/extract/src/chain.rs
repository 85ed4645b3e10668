//! Ordered fallback strategies for a single field.
//!
//! Each field names the ways it can be found, most specific first. The first
//! strategy that produces a value wins. When a fallback wins it gets logged,
//! since it usually means the primary selector has drifted.

use exn::OptionExt;

use crate::error::{ErrorKind, Result};

/// Something strategies can run against that can also describe itself when
/// every strategy misses.
pub(crate) trait Source {
    fn fragment(&self) -> String;
}

type Strategy<C, T> = fn(&C) -> Option<T>;

pub(crate) struct Chain<C, T> {
    field: &'static str,
    strategies: Vec<(&'static str, Strategy<C, T>)>,
}

impl<C: Source, T> Chain<C, T> {
    pub(crate) fn new(field: &'static str) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub(crate) fn or(mut self, name: &'static str, strategy: Strategy<C, T>) -> Self {
        self.strategies.push((name, strategy));
        self
    }

    /// First value any strategy produces, for optional fields.
    pub(crate) fn first(&self, source: &C) -> Option<T> {
        self.strategies.iter().enumerate().find_map(|(position, (name, strategy))| {
            let value = strategy(source)?;
            if position > 0 {
                tracing::debug!(field = self.field, strategy = name, "primary strategy missed, used fallback");
            }
            Some(value)
        })
    }

    /// Like [`first`](Self::first), for fields a record can't exist without.
    ///
    /// # Errors
    /// [`ErrorKind::MissingField`] with a fragment of the source when every
    /// strategy misses.
    pub(crate) fn required(&self, source: &C) -> Result<T> {
        self.first(source).ok_or_raise(|| ErrorKind::MissingField {
            field: self.field,
            fragment: source.fragment(),
        })
    }
}
