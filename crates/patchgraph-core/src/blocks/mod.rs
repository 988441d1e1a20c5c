//! Built-in block catalog: the single time-root, numeric/cast primitives,
//! `Phasor`'s per-block state recurrence, `Delay`'s cross-block legal
//! cycle, `Array`'s instance declaration, and the `DefaultSource::*`
//! macros the normalizer synthesizes for unconnected exposed inputs.

mod array;
mod defaults;
mod math;
mod phasor;
mod time;

use crate::registry::BlockRegistry;

/// Populates `registry` with every built-in block type. Idempotent: call
/// again (e.g. after a registry reset) and every definition is replaced in
/// place, never duplicated.
pub fn register_builtins(registry: &mut BlockRegistry) {
    time::register(registry);
    math::register(registry);
    phasor::register(registry);
    array::register(registry);
    defaults::register(registry);
}
