//! Reserved words of the `.moo` structure grammar and MOO code.

/// Words that open or close structural constructs.
pub const STRUCTURE: &[&str] = &[
    "module", "database", "version", "requires", "exports", "max_object", "recycled",
    "forward", "include", "object", "endobject", "name", "owner", "parent", "location",
    "flags", "property", "inherited", "clear", "method", "endmethod", "command",
    "endcommand",
];

/// MOO statement keywords that open a control header (`if (...)`).
pub const HEADER: &[&str] = &["if", "elseif", "while", "for", "fork", "except"];

/// MOO block keywords that stand alone as a statement.
pub const BLOCK: &[&str] = &[
    "else", "endif", "endwhile", "endfor", "endfork", "try", "finally", "endtry",
];

pub fn is_header_keyword(word: &str) -> bool {
    HEADER.iter().any(|k| k.eq_ignore_ascii_case(word))
}

pub fn is_block_keyword(word: &str) -> bool {
    BLOCK.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Whether `word` lexes as a single identifier token.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first == '_' || (first.is_ascii() && unicode_ident::is_xid_start(first)) => {
            chars.all(|c| c.is_ascii() && unicode_ident::is_xid_continue(c))
        }
        _ => false,
    }
}

/// Whether `word` can be written as a bare method name rather than a string.
pub fn is_plain_verb_name(word: &str) -> bool {
    is_identifier(word) && !STRUCTURE.contains(&word)
}
