//! Command naming: deriving a stable dispatch key from a command value's type.

/// Returns the command name for `T`: its leaf type name with module path,
/// generic parameters, and indirection (`&`, `&mut`, `Box<...>`) stripped.
///
/// Total and deterministic. Two distinct types sharing a leaf name collide —
/// a deliberate simplicity/collision trade-off; use [`crate::handler::Handler::named`]
/// to disambiguate when that matters.
pub fn command_name<T: ?Sized>() -> String {
    leaf_name(std::any::type_name::<T>())
}

fn leaf_name(full: &str) -> String {
    let stripped = full.trim_start_matches(['&', '*']).trim_start();
    let stripped = stripped
        .strip_prefix("mut ")
        .unwrap_or(stripped)
        .trim_start();
    let without_generics = match stripped.find('<') {
        Some(idx) => &stripped[..idx],
        None => stripped,
    };
    match without_generics.rsplit_once("::") {
        Some((_, leaf)) => leaf.to_string(),
        None => without_generics.to_string(),
    }
}
