/// Single-slash join, grounded on the source's `strutils.SingleJoiningSlash`:
/// collapses `a`'s trailing slash with `b`'s leading slash into exactly one,
/// inserts one if neither side has it, and leaves `a` untouched if `b` is
/// empty (spec §4.4, §8 round-trip property).
pub fn join(a: &str, b: &str) -> String {
    if a.is_empty() {
        return b.to_string();
    }

    let a_slash = a.ends_with('/');
    let b_slash = b.starts_with('/');

    if a_slash && b_slash {
        format!("{a}{}", &b[1..])
    } else if !a_slash && !b_slash && !b.is_empty() {
        format!("{a}/{b}")
    } else {
        format!("{a}{b}")
    }
}
