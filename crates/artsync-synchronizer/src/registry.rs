//! Registration and routing of synchronizers

use crate::error::ParseError;
use crate::synchronizer::{DynSynchronizer, Synchronizer};
use std::fmt;

/// Synchronizers known to one driver, kept sorted by `order`
#[derive(Default)]
pub struct SynchronizerRegistry {
    synchronizers: Vec<Box<dyn DynSynchronizer>>,
}

impl fmt::Debug for SynchronizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizerRegistry")
            .field("types", &self.artefact_types())
            .finish()
    }
}

impl SynchronizerRegistry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronizer
    pub fn register<S: Synchronizer>(&mut self, synchronizer: S) {
        self.register_boxed(Box::new(synchronizer));
    }

    pub fn register_boxed(&mut self, synchronizer: Box<dyn DynSynchronizer>) {
        self.synchronizers.push(synchronizer);
        // Stable: equal orders keep registration order.
        self.synchronizers.sort_by_key(|s| s.order());
    }

    /// The one synchronizer accepting `location`
    ///
    /// # Errors
    /// [`ParseError::NoSynchronizer`] or [`ParseError::Ambiguous`]
    pub fn find_for_path(&self, location: &str) -> Result<&dyn DynSynchronizer, ParseError> {
        let mut matching = self
            .synchronizers
            .iter()
            .filter(|s| s.is_accepted_path(location));
        let first = matching
            .next()
            .ok_or_else(|| ParseError::NoSynchronizer(location.to_string()))?;
        let rest: Vec<&'static str> = matching.map(|s| s.artefact_type()).collect();
        if rest.is_empty() {
            Ok(&**first)
        } else {
            let mut types = vec![first.artefact_type()];
            types.extend(rest);
            Err(ParseError::Ambiguous {
                location: location.to_string(),
                types,
            })
        }
    }

    #[must_use]
    pub fn find_for_type(&self, artefact_type: &str) -> Option<&dyn DynSynchronizer> {
        self.synchronizers
            .iter()
            .find(|s| s.is_accepted_type(artefact_type))
            .map(|s| &**s)
    }

    /// Whether any synchronizer accepts `location`
    #[must_use]
    pub fn accepts(&self, location: &str) -> bool {
        self.synchronizers.iter().any(|s| s.is_accepted_path(location))
    }

    /// Synchronizers in forward phase order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &dyn DynSynchronizer> {
        self.synchronizers.iter().map(|s| &**s)
    }

    #[must_use]
    pub fn artefact_types(&self) -> Vec<&'static str> {
        self.synchronizers.iter().map(|s| s.artefact_type()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }
}
