//! Builtin functions typed without the catalog
//!
//! Polymorphic builtins whose result depends on their arguments in ways a
//! catalog signature cannot express. Everything else becomes a deferred
//! function lookup.

use sqlinfer_core::{Attribute, Load, LoadAttribute, Type, TypeKind, TypeOrLoad};

/// Functions whose result type is the common type of their arguments
pub const COALESCE_LIKE: &[&str] = &["coalesce", "greatest", "least"];

const DATE_FUNCTIONS: &[&str] = &[
    "now",
    "clock_timestamp",
    "statement_timestamp",
    "transaction_timestamp",
    "date_trunc",
    "make_date",
    "make_timestamp",
    "make_timestamptz",
    "to_timestamp",
];

const JSON_FUNCTIONS: &[&str] = &[
    "to_json",
    "to_jsonb",
    "row_to_json",
    "json_build_array",
    "jsonb_build_array",
    "json_object",
    "jsonb_object",
];

const JSON_AGGREGATES: &[&str] = &["json_agg", "jsonb_agg", "json_object_agg", "jsonb_object_agg"];

/// A builtin call: lowercase name, argument types and string literal
/// arguments (needed for `json_build_object` keys)
pub struct BuiltinCall<'a> {
    pub name: &'a str,
    pub args: Vec<TypeOrLoad>,
    pub literals: Vec<Option<String>>,
    pub star: bool,
}

/// Type a builtin, or `None` when the function must come from the catalog
pub fn builtin(call: BuiltinCall) -> Option<TypeOrLoad> {
    let BuiltinCall {
        name,
        args,
        literals,
        star,
    } = call;

    if COALESCE_LIKE.contains(&name) {
        return Some(coalesce_deferred(args));
    }

    let ty = match name {
        "count" if star || args.len() == 1 => Type::big_int().with_postgres("int8"),
        "array_agg" if args.len() == 1 => {
            let items = args.into_iter().next()?;
            return Some(match items {
                TypeOrLoad::Type(items) => Type::array(items).with_nullable(true).into(),
                deferred => Load::Array {
                    items: Box::new(deferred),
                    nullable: true,
                }
                .into(),
            });
        }
        "json_build_object" | "jsonb_build_object" => {
            return Some(build_object(args, &literals));
        }
        "date_part" => Type::number().with_postgres("float8"),
        _ if DATE_FUNCTIONS.contains(&name) => Type::date().with_postgres("timestamptz"),
        _ if JSON_FUNCTIONS.contains(&name) => Type::json(),
        _ if JSON_AGGREGATES.contains(&name) => Type::json().with_nullable(true),
        _ => return None,
    };
    Some(ty.into())
}

/// `json_build_object('a', x, 'b', y)`: an object literal when every key is a
/// string literal, plain json otherwise
fn build_object(args: Vec<TypeOrLoad>, literals: &[Option<String>]) -> TypeOrLoad {
    if args.len() % 2 != 0 {
        return Type::json().into();
    }

    let mut items = Vec::with_capacity(args.len() / 2);
    for (index, value) in args.into_iter().enumerate() {
        if index % 2 == 0 {
            continue;
        }
        let Some(Some(key)) = literals.get(index - 1) else {
            return Type::json().into();
        };
        items.push(LoadAttribute::new(key.clone(), value));
    }

    if items.iter().all(|item| !item.ty.is_deferred()) {
        let attributes = items
            .into_iter()
            .filter_map(|item| match item.ty {
                TypeOrLoad::Type(ty) => Some(Attribute::new(item.name, ty)),
                TypeOrLoad::Load(_) => None,
            })
            .collect();
        return Type::object_literal(attributes).into();
    }

    Load::ObjectLiteral {
        items,
        nullable: false,
    }
    .into()
}

fn coalesce_deferred(args: Vec<TypeOrLoad>) -> TypeOrLoad {
    if args.iter().any(TypeOrLoad::is_deferred) {
        return Load::Coalesce { items: args }.into();
    }

    let types = args
        .into_iter()
        .filter_map(|arg| match arg {
            TypeOrLoad::Type(ty) => Some(ty),
            TypeOrLoad::Load(_) => None,
        })
        .collect();
    coalesce(types).into()
}

/// Common type of `COALESCE`-like arguments.
///
/// Collapses to one type when every non-null item has the same kind,
/// otherwise a union. Nullable only when every item is nullable.
pub fn coalesce(items: Vec<Type>) -> Type {
    let nullable = items.iter().all(|item| item.nullable);
    let typed: Vec<Type> = items
        .into_iter()
        .filter(|item| !matches!(item.kind, TypeKind::Null))
        .collect();

    let Some(first) = typed.first() else {
        return Type::null();
    };

    if typed.iter().all(|item| item.same_tag(first)) {
        return first.clone().with_nullable(nullable);
    }

    Type::union_of(typed).with_nullable(nullable)
}
