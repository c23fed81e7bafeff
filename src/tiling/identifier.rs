//! Identifiers shared by the three files of a tile

use std::collections::HashSet;
use std::sync::Mutex;

use log::warn;
use uuid::Uuid;

/// Mints random (UUID v4) identifiers, never repeating one within a run
///
/// Safe to share between worker threads.
#[derive(Debug, Default)]
pub struct IdentifierGenerator {
    issued: Mutex<HashSet<Uuid>>,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh hyphenated identifier
    pub fn next(&self) -> String {
        let mut issued = match self.issued.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        loop {
            let id = Uuid::new_v4();
            if issued.insert(id) {
                return id.hyphenated().to_string();
            }
            warn!("Identifier collision on {}, drawing again", id);
        }
    }

    /// Number of identifiers minted so far
    pub fn issued(&self) -> usize {
        match self.issued.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
