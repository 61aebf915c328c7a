//! Mixin discovery

use super::list_source_files;
use crate::config::SCRIPT_EXT;
use crate::orm::MixinRegistry;
use crate::script::ScriptLoader;
use crate::utils::classify;
use std::path::PathBuf;

/// Register every mixin script found in `sources` under its Pascal-cased base
/// name. Scripts without a registered function are skipped. Returns the
/// number of registrations.
pub fn load_mixin_definitions(
    sources: &[PathBuf],
    mixins: &MixinRegistry,
    scripts: &dyn ScriptLoader,
) -> usize {
    let mut registered = 0;
    for dir in sources {
        for file in list_source_files(dir) {
            if file.ext != SCRIPT_EXT {
                continue;
            }
            let Some(mixin) = scripts.mixin(&file.path) else {
                continue;
            };
            let name = classify(&file.base);
            tracing::debug!("Registering mixin {} from {}", name, file.path.display());
            mixins.define(name, mixin);
            registered += 1;
        }
    }
    registered
}
