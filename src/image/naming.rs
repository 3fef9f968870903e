//! Local names for decompiled objects.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::syntax::keywords::is_identifier;

/// Lowercase ASCII slug of a display name: runs of anything that is not a
/// letter or digit become one `_`. A leading digit gets an `obj_` prefix and
/// an empty slug becomes `obj<number>`.
pub fn slug(display: &str, number: i64) -> String {
    let mut out = String::with_capacity(display.len());
    for ch in display.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        return if number < 0 {
            format!("obj_m{}", number.unsigned_abs())
        } else {
            format!("obj{number}")
        };
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "obj_");
    }
    out
}

/// Hands out unique local names in the order objects are offered.
#[derive(Debug, Default)]
pub struct Namer {
    taken: FxHashSet<String>,
}

impl Namer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for object `number` displayed as `display`. Clashes get `_2`,
    /// `_3`, ... appended.
    pub fn name(&mut self, display: &str, number: i64) -> SmolStr {
        let base = slug(display, number);
        let base = if is_identifier(&base) {
            base
        } else {
            format!("obj_{base}")
        };
        if self.taken.insert(base.clone()) {
            return base.into();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate.into();
            }
            n += 1;
        }
    }
}
