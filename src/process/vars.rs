//! `$KERNWATCH_*` variables for child command lines.

use std::path::Path;

use rustc_hash::FxHashMap;

const CONNECTION_FILE_VAR: &str = "KERNWATCH_CONNECTION_FILE";
const TARGET_VAR: &str = "KERNWATCH_TARGET";

/// Variables exported to every child and substituted into its argv.
pub fn build_session_vars(connection_file: &Path, target: &Path) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();
    vars.insert(
        CONNECTION_FILE_VAR.into(),
        connection_file.display().to_string(),
    );
    vars.insert(TARGET_VAR.into(), target.display().to_string());
    vars
}

/// Resolve `$KERNWATCH_*` variables in command arguments
///
/// Replaces occurrences of `$KERNWATCH_XXX` with actual values from the vars map
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for (key, value) in vars {
                let pattern = format!("${}", key);
                result = result.replace(&pattern, value);
            }
            result
        })
        .collect()
}
