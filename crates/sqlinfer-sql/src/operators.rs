//! Binary operator overloads
//!
//! A static table of `(left, right) -> result` variants per operator, and the
//! overload selection shared by the extractor (when both operands are already
//! concrete) and the resolution engine.

use sqlinfer_core::{OperatorPart, OperatorVariant, Type, TypeKind};

/// Coarse operand kinds used to spell the table
#[derive(Debug, Clone, Copy)]
enum K {
    Num,
    Big,
    Str,
    Bool,
    Date,
    Json,
    AnyArray,
    StrArray,
}

impl K {
    fn to_type(self) -> Type {
        match self {
            K::Num => Type::number(),
            K::Big => Type::big_int(),
            K::Str => Type::string(),
            K::Bool => Type::boolean(),
            K::Date => Type::date(),
            K::Json => Type::json(),
            K::AnyArray => Type::array(Type::any()),
            K::StrArray => Type::array(Type::string()),
        }
    }
}

use K::*;

/// Integer and floating arithmetic, then numeric/interval spelled as strings
const ARITHMETIC: &[(K, K, K)] = &[
    (Num, Num, Num),
    (Big, Big, Big),
    (Big, Num, Big),
    (Num, Big, Big),
    (Str, Str, Str),
];

const OPERATORS: &[(&str, &[(K, K, K)])] = &[
    ("+", &[
        (Num, Num, Num),
        (Big, Big, Big),
        (Big, Num, Big),
        (Num, Big, Big),
        (Str, Str, Str),
        (Date, Str, Date),
        (Str, Date, Date),
    ]),
    ("-", &[
        (Num, Num, Num),
        (Big, Big, Big),
        (Big, Num, Big),
        (Num, Big, Big),
        (Str, Str, Str),
        (Date, Str, Date),
        (Date, Date, Str),
        (Json, Str, Json),
    ]),
    ("*", &[
        (Num, Num, Num),
        (Big, Big, Big),
        (Big, Num, Big),
        (Num, Big, Big),
        (Str, Str, Str),
        (Str, Num, Str),
    ]),
    ("/", &[
        (Num, Num, Num),
        (Big, Big, Big),
        (Big, Num, Big),
        (Num, Big, Big),
        (Str, Str, Str),
        (Str, Num, Str),
    ]),
    ("%", ARITHMETIC),
    ("^", &[(Num, Num, Num), (Str, Str, Str)]),
    ("&", &[(Num, Num, Num), (Big, Big, Big)]),
    ("|", &[(Num, Num, Num), (Big, Big, Big)]),
    ("#", &[(Num, Num, Num), (Big, Big, Big)]),
    ("<<", &[(Num, Num, Num), (Big, Num, Big)]),
    (">>", &[(Num, Num, Num), (Big, Num, Big)]),
    ("||", &[
        (Str, Str, Str),
        (Json, Json, Json),
        (AnyArray, AnyArray, AnyArray),
    ]),
    ("->", &[(Json, Str, Json), (Json, Num, Json)]),
    ("->>", &[(Json, Str, Str), (Json, Num, Str)]),
    ("#>", &[(Json, StrArray, Json)]),
    ("#>>", &[(Json, StrArray, Str)]),
    ("@>", &[(Json, Json, Bool), (AnyArray, AnyArray, Bool)]),
    ("<@", &[(Json, Json, Bool), (AnyArray, AnyArray, Bool)]),
    ("&&", &[(AnyArray, AnyArray, Bool)]),
    ("?", &[(Json, Str, Bool)]),
    ("?|", &[(Json, StrArray, Bool)]),
    ("?&", &[(Json, StrArray, Bool)]),
    ("~", &[(Str, Str, Bool)]),
    ("~*", &[(Str, Str, Bool)]),
    ("!~", &[(Str, Str, Bool)]),
    ("!~*", &[(Str, Str, Bool)]),
    ("@@", &[(Str, Str, Bool)]),
];

/// Comparison operators always yield a boolean
pub const COMPARISON: &[&str] = &["=", "<>", "<", ">", "<=", ">="];

pub fn is_comparison(op: &str) -> bool {
    COMPARISON.contains(&op)
}

/// Known overloads of a binary operator, in preference order
pub fn variants(op: &str) -> Vec<OperatorVariant> {
    OPERATORS
        .iter()
        .find(|(name, _)| *name == op)
        .map(|(_, table)| {
            table
                .iter()
                .map(|(left, right, result)| {
                    OperatorVariant::new(left.to_type(), right.to_type(), result.to_type())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Same kind, ignoring nullability and the postgres name; literals are strings
fn exact(declared: &Type, actual: &Type) -> bool {
    match (&declared.kind, &actual.kind) {
        (TypeKind::String, TypeKind::Literal { .. }) => true,
        (TypeKind::Array { items: a }, TypeKind::Array { items: b }) => exact(a, b),
        (a, b) => a == b,
    }
}

/// Pick the overload for `left op right`.
///
/// 1. The first variant matching both operand kinds exactly, in table order.
/// 2. With one operand unknown (e.g. a parameter), the first exact variant
///    whose operands both have the known operand's kind.
/// 3. The only variant matching on either side.
///
/// Anything else is unresolved.
pub fn select_variant<'v>(
    available: &'v [OperatorVariant],
    left: &Type,
    right: &Type,
) -> Option<&'v OperatorVariant> {
    if let Some(found) = available
        .iter()
        .find(|v| exact(&v.left, left) && exact(&v.right, right))
    {
        return Some(found);
    }

    let known = match (left.is_unknown(), right.is_unknown()) {
        (true, false) => Some(right),
        (false, true) => Some(left),
        _ => None,
    };
    if let Some(known) = known {
        if let Some(found) = available
            .iter()
            .find(|v| exact(&v.left, known) && exact(&v.right, known))
        {
            return Some(found);
        }
    }

    let mut loose = available
        .iter()
        .filter(|v| v.left.matches(left) || v.right.matches(right));
    match (loose.next(), loose.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Resolve one part of an operator overload against concrete operands.
///
/// The result part is nullable when either operand is.
pub fn resolve_part(
    available: &[OperatorVariant],
    left: &Type,
    right: &Type,
    part: OperatorPart,
) -> Type {
    let Some(variant) = select_variant(available, left, right) else {
        return Type::unknown();
    };

    match part {
        OperatorPart::Left => variant.left.clone(),
        OperatorPart::Right => variant.right.clone(),
        OperatorPart::Result => variant
            .result
            .clone()
            .with_nullable(left.nullable || right.nullable),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        let plus = variants("+");
        let result = resolve_part(&plus, &Type::number(), &Type::number(), OperatorPart::Result);
        assert_eq!(result.kind, TypeKind::Number);
        assert!(!result.nullable);

        let result = resolve_part(&plus, &Type::big_int(), &Type::number(), OperatorPart::Result);
        assert_eq!(result.kind, TypeKind::BigInt);
    }

    #[test]
    fn nullable_operand_makes_nullable_result() {
        let plus = variants("+");
        let result = resolve_part(
            &plus,
            &Type::number().with_nullable(true),
            &Type::number(),
            OperatorPart::Result,
        );
        assert_eq!(result.kind, TypeKind::Number);
        assert!(result.nullable);
    }

    #[test]
    fn unknown_operand_takes_the_other_kind() {
        let plus = variants("+");
        let left = resolve_part(&plus, &Type::unknown(), &Type::number(), OperatorPart::Left);
        assert_eq!(left.kind, TypeKind::Number);

        let minus = variants("-");
        let right = resolve_part(&minus, &Type::date(), &Type::unknown(), OperatorPart::Right);
        assert_eq!(right.kind, TypeKind::Date);
    }

    #[test]
    fn unique_loose_match() {
        let arrow = variants("->>");
        let result = resolve_part(&arrow, &Type::json(), &Type::boolean(), OperatorPart::Result);
        // Both variants match on the left side, so nothing is unique
        assert!(result.is_unknown());

        let contains = variants("?|");
        let right = resolve_part(&contains, &Type::json(), &Type::unknown(), OperatorPart::Right);
        assert!(matches!(right.kind, TypeKind::Array { .. }));
    }

    #[test]
    fn array_operators_match_any_element() {
        let overlap = variants("&&");
        let result = resolve_part(
            &overlap,
            &Type::array(Type::number()),
            &Type::array(Type::number()),
            OperatorPart::Result,
        );
        assert_eq!(result.kind, TypeKind::Boolean);
    }

    #[test]
    fn unknown_operator_has_no_variants() {
        assert!(variants("<->").is_empty());
        let result = resolve_part(&[], &Type::number(), &Type::number(), OperatorPart::Result);
        assert!(result.is_unknown());
    }
}
