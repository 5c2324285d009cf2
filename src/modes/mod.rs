//! Built-in modes.
//!
//! | mode       | stages          | compiles to                                |
//! |------------|-----------------|--------------------------------------------|
//! | `json`     | all             | a constant; `body` assigns it as children  |
//! | `template` | all             | an interpolated string; `body` sets markup |
//! | `html`     | all             | same as `template`                         |
//! | `text`     | all             | as `template`, but `body` sets plain text  |
//! | `script`   | all             | a statement list; `body` assigns `return`  |

mod json;
mod script;
mod template;

use crate::registry::ModeRegistry;

/// Register every built-in mode. Later registrations replace these.
pub fn register_builtin_modes(registry: &mut ModeRegistry) {
    json::register(registry);
    template::register(registry);
    script::register(registry);
}
