//! Filter conditions in the server's query syntax.
//!
//! Conditions render as `name=value` fragments and are combined by
//! [`EntityQuery`](crate::uri::EntityQuery), which joins them with `;`
//! (logical AND). Formatting is permissive: malformed input produces
//! malformed output rather than an error.

use std::fmt::Display;

/// A string condition: `name='value'`, with the value escaped.
///
/// ```
/// use mqm_rest::query::condition;
///
/// assert_eq!(condition("name", "O'Brien"), r"name='O\'Brien'");
/// ```
pub fn condition(name: &str, value: &str) -> String {
    format!("{}='{}'", name, escape_query_value(value))
}

/// A numeric condition: `name=value`.
///
/// ```
/// use mqm_rest::query::condition_num;
///
/// assert_eq!(condition_num("id", 1002), "id=1002");
/// ```
pub fn condition_num(name: &str, value: impl Display) -> String {
    format!("{}={}", name, value)
}

/// A reference by id: `name={id=ID}`.
pub fn condition_ref_id(name: &str, id: u64) -> String {
    format!("{}={{id={}}}", name, id)
}

/// A reference by a field of the referenced entity: `name={ref_name='value'}`.
///
/// ```
/// use mqm_rest::query::condition_ref;
///
/// assert_eq!(
///     condition_ref("release", "name", "R1"),
///     "release={name='R1'}"
/// );
/// ```
pub fn condition_ref(name: &str, ref_name: &str, value: &str) -> String {
    format!("{}={{{}}}", name, condition(ref_name, value))
}

/// Doubles backslashes, then escapes single and double quotes.
pub fn escape_query_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' | '"' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
