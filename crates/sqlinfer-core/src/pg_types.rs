//! Postgres type alias table
//!
//! Maps built-in postgres type names, their SQL-standard aliases and array
//! spellings to concrete [`Type`]s. Names not found here are user defined
//! (enums, composites) and must be looked up in the catalog.

use crate::types::Type;
use regex::Regex;
use std::sync::LazyLock;

/// Base kind a built-in type maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    String,
    Number,
    BigInt,
    Boolean,
    Date,
    Json,
    Any,
    AnyArray,
    Void,
    Unknown,
}

/// (canonical name, accepted spellings, base kind)
const ALIASES: &[(&str, &[&str], Base)] = &[
    // Boolean
    ("bool", &["bool", "boolean"], Base::Boolean),
    // Integers
    ("int2", &["int2", "smallint", "smallserial", "serial2"], Base::Number),
    ("int4", &["int4", "integer", "int", "serial", "serial4"], Base::Number),
    ("int8", &["int8", "bigint", "bigserial", "serial8"], Base::BigInt),
    ("oid", &["oid", "xid", "cid", "regproc"], Base::Number),
    // Floating point
    ("float4", &["float4", "real"], Base::Number),
    ("float8", &["float8", "double precision", "float"], Base::Number),
    // Arbitrary precision, kept lossless as strings
    ("numeric", &["numeric", "decimal"], Base::String),
    ("money", &["money"], Base::String),
    // Character types
    ("text", &["text"], Base::String),
    ("varchar", &["varchar", "character varying"], Base::String),
    ("bpchar", &["bpchar", "character", "char"], Base::String),
    ("name", &["name"], Base::String),
    ("citext", &["citext"], Base::String),
    ("uuid", &["uuid"], Base::String),
    ("xml", &["xml"], Base::String),
    ("bytea", &["bytea"], Base::String),
    // Bit strings
    ("bit", &["bit"], Base::String),
    ("varbit", &["varbit", "bit varying"], Base::String),
    // Date and time
    ("date", &["date"], Base::Date),
    ("timestamp", &["timestamp", "timestamp without time zone"], Base::Date),
    ("timestamptz", &["timestamptz", "timestamp with time zone"], Base::Date),
    ("time", &["time", "time without time zone"], Base::String),
    ("timetz", &["timetz", "time with time zone"], Base::String),
    ("interval", &["interval"], Base::String),
    // JSON
    ("json", &["json"], Base::Json),
    ("jsonb", &["jsonb"], Base::Json),
    ("jsonpath", &["jsonpath"], Base::String),
    // Network
    ("inet", &["inet"], Base::String),
    ("cidr", &["cidr"], Base::String),
    ("macaddr", &["macaddr"], Base::String),
    ("macaddr8", &["macaddr8"], Base::String),
    // Geometry
    ("point", &["point"], Base::String),
    ("line", &["line"], Base::String),
    ("lseg", &["lseg"], Base::String),
    ("box", &["box"], Base::String),
    ("path", &["path"], Base::String),
    ("polygon", &["polygon"], Base::String),
    ("circle", &["circle"], Base::String),
    // Text search
    ("tsvector", &["tsvector"], Base::String),
    ("tsquery", &["tsquery"], Base::String),
    ("regconfig", &["regconfig"], Base::String),
    // Ranges
    ("int4range", &["int4range"], Base::String),
    ("int8range", &["int8range"], Base::String),
    ("numrange", &["numrange"], Base::String),
    ("tsrange", &["tsrange"], Base::String),
    ("tstzrange", &["tstzrange"], Base::String),
    ("daterange", &["daterange"], Base::String),
    // Object identifiers
    ("regclass", &["regclass"], Base::String),
    ("regtype", &["regtype"], Base::String),
    ("regnamespace", &["regnamespace"], Base::String),
    ("regrole", &["regrole"], Base::String),
    ("pg_lsn", &["pg_lsn"], Base::String),
    // Pseudo types
    ("any", &["any"], Base::Any),
    ("anyelement", &["anyelement"], Base::Any),
    ("anynonarray", &["anynonarray"], Base::Any),
    ("anyenum", &["anyenum"], Base::Any),
    ("anycompatible", &["anycompatible"], Base::Any),
    ("anycompatiblenonarray", &["anycompatiblenonarray"], Base::Any),
    ("anyrange", &["anyrange"], Base::Any),
    ("record", &["record"], Base::Any),
    ("internal", &["internal"], Base::Any),
    ("anyarray", &["anyarray"], Base::AnyArray),
    ("anycompatiblearray", &["anycompatiblearray"], Base::AnyArray),
    ("void", &["void"], Base::Void),
    ("unknown", &["unknown"], Base::Unknown),
    ("trigger", &["trigger"], Base::Unknown),
    ("cstring", &["cstring"], Base::String),
];

static MODIFIERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("static regex"));

static ARRAY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*((?:\[\s*\d*\s*\])+)$").expect("static regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// A type name split into its base name and array dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    /// Schema prefix, if the name was qualified
    pub schema: Option<String>,

    /// Lowercased base name without modifiers
    pub name: String,

    /// Number of array dimensions (`int4[][]`, `_int4`)
    pub dimensions: usize,
}

/// Normalize a postgres type spelling.
///
/// Lowercases, drops modifiers such as `(255)` or `(3)`, collapses
/// whitespace and counts array dimensions from `[]` suffixes, a trailing
/// `ARRAY` keyword or the internal `_name` spelling.
pub fn normalize(raw: &str) -> TypeName {
    let lowered = raw.trim().to_lowercase();
    let stripped = MODIFIERS.replace_all(&lowered, "");
    let mut text = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();
    let mut dimensions = 0;

    if let Some(captures) = ARRAY_SUFFIX.captures(&text) {
        dimensions += captures[2].matches('[').count();
        text = captures[1].to_string();
    }

    if let Some(base) = text.strip_suffix(" array") {
        dimensions += 1;
        text = base.to_string();
    }

    let (schema, mut name) = match text.split_once('.') {
        Some((schema, name)) if !name.is_empty() => {
            (Some(schema.trim_matches('"').to_string()), name.to_string())
        }
        _ => (None, text),
    };

    if dimensions == 0 {
        if let Some(element) = name.strip_prefix('_') {
            dimensions = 1;
            name = element.to_string();
        }
    }

    let schema = schema.filter(|s| s != "pg_catalog");

    TypeName {
        schema,
        name: name.trim_matches('"').to_string(),
        dimensions,
    }
}

fn find_alias(name: &str) -> Option<(&'static str, Base)> {
    ALIASES
        .iter()
        .find(|(_, spellings, _)| spellings.contains(&name))
        .map(|(canonical, _, base)| (*canonical, *base))
}

fn base_type(base: Base) -> Type {
    match base {
        Base::String => Type::string(),
        Base::Number => Type::number(),
        Base::BigInt => Type::big_int(),
        Base::Boolean => Type::boolean(),
        Base::Date => Type::date(),
        Base::Json => Type::json(),
        Base::Any => Type::any(),
        Base::AnyArray => Type::array(Type::any()),
        Base::Void => Type::null(),
        Base::Unknown => Type::unknown(),
    }
}

/// Canonical name of a built-in type, e.g. `integer` -> `int4`
pub fn canonical_name(raw: &str) -> Option<&'static str> {
    let parsed = normalize(raw);
    if parsed.schema.is_some() {
        return None;
    }
    find_alias(&parsed.name).map(|(canonical, _)| canonical)
}

/// True when `raw` names a built-in type (including arrays of one)
pub fn is_builtin(raw: &str) -> bool {
    canonical_name(raw).is_some()
}

/// Concrete type for a built-in postgres type name, `None` for user types
pub fn lookup(raw: &str) -> Option<Type> {
    let parsed = normalize(raw);
    if parsed.schema.is_some() {
        return None;
    }
    let (canonical, base) = find_alias(&parsed.name)?;

    let mut ty = base_type(base).with_postgres(canonical);
    for _ in 0..parsed.dimensions {
        ty = Type::array(ty).with_postgres(format!("_{}", canonical));
    }
    Some(ty)
}
