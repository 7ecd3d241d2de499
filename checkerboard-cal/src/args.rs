//! Minimal command line flag lookup.
//!
//! Flags are matched as whole tokens anywhere in the argument list. Values
//! are returned as given; conversion and range checks are up to the caller.

pub fn has_flag<S: AsRef<str>>(args: &[S], name: &str) -> bool {
    args.iter().any(|a| a.as_ref() == name)
}

/// The token directly after the first occurrence of `name`.
pub fn flag_value<'a, S: AsRef<str>>(args: &'a [S], name: &str) -> Option<&'a str> {
    let idx = args.iter().position(|a| a.as_ref() == name)?;
    args.get(idx + 1).map(|v| v.as_ref())
}
