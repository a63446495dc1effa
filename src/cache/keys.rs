//! Cache key and tag definitions.
//!
//! Keys are plain strings: the operation name followed by each parameter
//! value, in the order the caller supplies them, joined with [`KEY_DELIMITER`].
//! Values are escaped so a client-supplied value can never span segments.

/// Separator between the operation name and each parameter value.
pub const KEY_DELIMITER: char = '-';

const ESCAPE: char = '%';

/// Logical operation names used as key prefixes.
pub mod operations {
    pub const GET_ALL_AUTHORS: &str = "getAllAuthors";
    pub const GET_ALL_BOOKS: &str = "getAllBooks";
}

/// Invalidation tags. Case-sensitive; read and write paths must agree.
pub mod tags {
    pub const AUTHORS: &str = "AuthorsCache";
    pub const BOOKS: &str = "booksCache";
}

/// Build a deterministic cache key.
///
/// Only parameter values are embedded; names document intent at the call
/// site. Callers must therefore keep parameter order fixed per operation.
/// The delimiter and `%` inside a value are percent-encoded.
pub fn build_key(operation: &str, params: &[(&str, &str)]) -> String {
    let capacity = operation.len() + params.iter().map(|(_, v)| v.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push_str(operation);
    for (_, value) in params {
        key.push(KEY_DELIMITER);
        push_escaped(&mut key, value);
    }
    key
}

fn push_escaped(key: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            KEY_DELIMITER => key.push_str("%2D"),
            ESCAPE => key.push_str("%25"),
            other => key.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_embeds_values_in_order() {
        let key = build_key(operations::GET_ALL_BOOKS, &[("page", "1"), ("limit", "3")]);
        assert_eq!(key, "getAllBooks-1-3");
    }

    #[test]
    fn identical_inputs_produce_identical_keys() {
        let params = [("page", "4"), ("limit", "10")];
        let first = build_key(operations::GET_ALL_AUTHORS, &params);
        for _ in 0..10 {
            assert_eq!(build_key(operations::GET_ALL_AUTHORS, &params), first);
        }
    }

    #[test]
    fn different_pagination_produces_different_keys() {
        let a = build_key(operations::GET_ALL_BOOKS, &[("page", "1"), ("limit", "3")]);
        let b = build_key(operations::GET_ALL_BOOKS, &[("page", "2"), ("limit", "3")]);
        let c = build_key(operations::GET_ALL_BOOKS, &[("page", "1"), ("limit", "30")]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn delimiter_inside_value_cannot_forge_extra_segments() {
        let forged = build_key(operations::GET_ALL_BOOKS, &[("page", "1"), ("version", "3-admin")]);
        let genuine = build_key(
            operations::GET_ALL_BOOKS,
            &[("page", "1"), ("version", "3"), ("view", "admin")],
        );
        assert_eq!(forged, "getAllBooks-1-3%2Dadmin");
        assert_ne!(forged, genuine);

        let escaped = build_key(operations::GET_ALL_BOOKS, &[("version", "3%2Dadmin")]);
        assert_eq!(escaped, "getAllBooks-3%252Dadmin");
        assert_ne!(escaped, forged);
    }

    #[test]
    fn operation_without_params_is_bare_name() {
        assert_eq!(build_key("ping", &[]), "ping");
    }
}
