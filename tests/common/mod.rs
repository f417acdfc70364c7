#![allow(dead_code)]

pub use cronherd_test_utils::builders;
pub use cronherd_test_utils::harness::Harness;
pub use cronherd_test_utils::scripts::ScriptDir;
pub use cronherd_test_utils::{init_tracing, with_timeout, with_timeout_secs};

use cronherd::model::TaskDefinition;

/// Cron expression that only fires once a year (Jan 1, midnight), so a
/// schedule armed in a test stays live without firing.
pub const YEARLY: &str = "0 0 0 1 1 *";

/// Definition for a script that exists in `dir`, scheduled yearly.
pub fn yearly_task(dir: &ScriptDir, id: &str, body: &str) -> TaskDefinition {
    TaskDefinition::new(id, dir.script_str(&format!("{id}.sh"), body), YEARLY)
}
