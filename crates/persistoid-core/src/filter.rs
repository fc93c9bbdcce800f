//! Key eligibility filter

use std::collections::BTreeSet;

use crate::CONTROL_KEY;

/// Decides which state keys are eligible for persistence
///
/// A key passes when `(no whitelist OR key in whitelist OR key is the control
/// key) AND key not in blacklist`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    whitelist: Option<BTreeSet<String>>,
    blacklist: Option<BTreeSet<String>>,
}

impl KeyFilter {
    /// Create a filter from optional include/exclude sets
    pub fn new(whitelist: Option<BTreeSet<String>>, blacklist: Option<BTreeSet<String>>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    /// Filter that accepts every key
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Check whether a key should be persisted
    pub fn allows(&self, key: &str) -> bool {
        if let Some(whitelist) = &self.whitelist {
            if !whitelist.contains(key) && key != CONTROL_KEY {
                return false;
            }
        }
        if let Some(blacklist) = &self.blacklist {
            if blacklist.contains(key) {
                return false;
            }
        }
        true
    }
}
