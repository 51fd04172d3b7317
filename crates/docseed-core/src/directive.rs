//! Reserved keys of the templating layer.

/// Prefix marking fragment definitions and directive keys.
pub const SIGIL: char = '$';
/// Merge a named fragment, overridden by sibling keys.
pub const EXTEND: &str = "$extend";
/// Replace the node with the value of an expression.
pub const EVAL: &str = "$eval";
/// Splice another file's top-level definitions into the document.
pub const REQUIRE: &str = "$require";

/// Returns true for the keys that instruct the resolver or composer.
pub fn is_directive_key(key: &str) -> bool {
    matches!(key, EXTEND | EVAL | REQUIRE)
}

/// Strip the sigil from a top-level key, if it names a fragment.
pub fn fragment_name(key: &str) -> Option<&str> {
    if is_directive_key(key) {
        return None;
    }
    key.strip_prefix(SIGIL).filter(|name| !name.is_empty())
}
