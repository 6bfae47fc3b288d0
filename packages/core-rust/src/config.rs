//! Serializable strategy settings for composed storages.

use serde::{Deserialize, Serialize};

use crate::composition::{PullStrategy, SetStrategy};
use crate::logging;
use crate::zip::ZipStrategy;

/// Strategy bundle for composing storages.
///
/// Every field has a default, so a partial document (or an empty one)
/// deserializes into a usable configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinationConfig {
    /// When a back-tier hit is copied into the front tier.
    pub pull_strategy: PullStrategy,
    /// Which tiers a write reaches, and in which order.
    pub set_strategy: SetStrategy,
    /// How zipped completions are paired.
    pub zip_strategy: ZipStrategy,
    /// Whether combinator decisions are traced.
    pub verbose: bool,
}

impl CombinationConfig {
    /// Applies [`verbose`](Self::verbose) to the process-wide trace switch.
    pub fn install_verbose(&self) {
        logging::set_verbose(self.verbose);
    }
}
