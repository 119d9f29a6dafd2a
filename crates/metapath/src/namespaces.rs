//! Well-known namespace URIs and their default prefixes.

/// Namespace of the built-in atomic type names (`meta:integer`).
pub const METAPATH_TYPES: &str = "http://csrc.nist.gov/ns/metaschema/metapath-types";
/// Namespace for Metapath extension functions.
pub const METAPATH_FUNCTIONS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions";
pub const FUNCTIONS: &str = "http://www.w3.org/2005/xpath-functions";
pub const MAP_FUNCTIONS: &str = "http://www.w3.org/2005/xpath-functions/map";
pub const ARRAY_FUNCTIONS: &str = "http://www.w3.org/2005/xpath-functions/array";
pub const MATH_FUNCTIONS: &str = "http://www.w3.org/2005/xpath-functions/math";

/// Prefixes bound in every static context.
pub const WELL_KNOWN_PREFIXES: [(&str, &str); 6] = [
    ("meta", METAPATH_TYPES),
    ("mp", METAPATH_FUNCTIONS),
    ("fn", FUNCTIONS),
    ("map", MAP_FUNCTIONS),
    ("array", ARRAY_FUNCTIONS),
    ("math", MATH_FUNCTIONS),
];
