//! Variable binding between steps: extraction from results, substitution
//! into later specifications, and fan-out over multi-valued variables.

mod expansion;
mod extraction;
mod substitution;

pub use expansion::expand_array_variables;
pub use extraction::{extract_variables_from_result, normalize_variable_name, resolve_path};
pub use substitution::{substitute_json, substitute_text, substitute_variables};
