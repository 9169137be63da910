//! Type algebra shared by the extractor and the resolution engine
//!
//! Every expression is typed as a [`TypeOrLoad`]: either a concrete [`Type`]
//! or a deferred [`Load`] describing what must be looked up in the catalog.
//! Concrete containers only ever hold concrete types, so a fully resolved
//! interface cannot contain a deferred value by construction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte offsets into the original SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,

    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both spans
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named member of a composite type or object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Closed set of concrete type kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypeKind {
    String,
    Number,
    BigInt,
    Boolean,
    Date,
    Null,
    Json,

    /// Could not be inferred; matches nothing when comparing overloads
    Unknown,

    /// Polymorphic; matches everything when comparing overloads
    Any,

    /// A single string literal, used for enum labels
    Literal { value: String },

    Composite {
        name: String,
        attributes: Vec<Attribute>,
    },

    Array { items: Box<Type> },

    Union { items: Vec<Type> },

    ObjectLiteral { items: Vec<Attribute> },

    /// A value that may be omitted entirely (e.g. a column with a default)
    Optional { value: Box<Type> },
}

/// A concrete type with its nullability and originating postgres type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    #[serde(flatten)]
    pub kind: TypeKind,

    #[serde(default)]
    pub nullable: bool,

    /// Canonical postgres name (e.g. `int4`), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<String>,
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: false,
            postgres: None,
        }
    }

    pub fn string() -> Self {
        Self::new(TypeKind::String)
    }

    pub fn number() -> Self {
        Self::new(TypeKind::Number)
    }

    pub fn big_int() -> Self {
        Self::new(TypeKind::BigInt)
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    pub fn date() -> Self {
        Self::new(TypeKind::Date)
    }

    pub fn json() -> Self {
        Self::new(TypeKind::Json)
    }

    /// The type of a bare `NULL`, always nullable
    pub fn null() -> Self {
        Self::new(TypeKind::Null).with_nullable(true)
    }

    pub fn unknown() -> Self {
        Self::new(TypeKind::Unknown)
    }

    pub fn any() -> Self {
        Self::new(TypeKind::Any)
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::new(TypeKind::Literal {
            value: value.into(),
        })
    }

    pub fn composite(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self::new(TypeKind::Composite {
            name: name.into(),
            attributes,
        })
    }

    pub fn array(items: Type) -> Self {
        Self::new(TypeKind::Array {
            items: Box::new(items),
        })
    }

    pub fn object_literal(items: Vec<Attribute>) -> Self {
        Self::new(TypeKind::ObjectLiteral { items })
    }

    pub fn optional(value: Type) -> Self {
        Self::new(TypeKind::Optional {
            value: Box::new(value),
        })
    }

    /// Build a union, flattening nested unions and collapsing duplicates.
    ///
    /// Items with the same kind are merged into one, OR-ing nullability.
    /// `NULL` members only make the union nullable, and so do `Unknown`
    /// members once any other member is known. A union of a single distinct
    /// item is that item.
    pub fn union_of(items: Vec<Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        let mut nullable = false;

        for item in items {
            nullable |= item.nullable;
            let members = match item.kind {
                TypeKind::Union { items } => items,
                kind => vec![Type {
                    kind,
                    nullable: item.nullable,
                    postgres: item.postgres,
                }],
            };

            for member in members {
                if matches!(member.kind, TypeKind::Null) {
                    nullable = true;
                    continue;
                }
                match flat.iter_mut().find(|existing| existing.kind == member.kind) {
                    Some(existing) => existing.nullable |= member.nullable,
                    None => flat.push(member),
                }
            }
        }

        if flat.iter().any(|member| !member.is_unknown()) {
            flat.retain(|member| {
                if member.is_unknown() {
                    nullable |= member.nullable;
                    return false;
                }
                true
            });
        }

        if flat.is_empty() {
            return Self::null();
        }

        if flat.len() == 1 {
            let mut only = flat.remove(0);
            only.nullable = nullable;
            return only;
        }

        Self::new(TypeKind::Union { items: flat }).with_nullable(nullable)
    }

    /// Set nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the originating postgres type name
    pub fn with_postgres(mut self, postgres: impl Into<String>) -> Self {
        self.postgres = Some(postgres.into());
        self
    }

    pub fn is_any(&self) -> bool {
        matches!(self.kind, TypeKind::Any)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    /// True when both types have the same kind discriminant
    pub fn same_tag(&self, other: &Type) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }

    /// Overload equality: `Any` matches everything, `Unknown` matches nothing,
    /// `NULL` fits any declared type and literals compare as strings.
    pub fn matches(&self, other: &Type) -> bool {
        match (&self.kind, &other.kind) {
            (TypeKind::Unknown, _) | (_, TypeKind::Unknown) => false,
            (TypeKind::Any, _) | (_, TypeKind::Any) => true,
            (TypeKind::Null, _) | (_, TypeKind::Null) => true,
            (TypeKind::Array { items: a }, TypeKind::Array { items: b }) => a.matches(b),
            (TypeKind::Literal { .. }, TypeKind::String)
            | (TypeKind::String, TypeKind::Literal { .. }) => true,
            (TypeKind::Union { items }, _) => items.iter().any(|item| item.matches(other)),
            (_, TypeKind::Union { items }) => items.iter().any(|item| self.matches(item)),
            (TypeKind::Composite { name: a, .. }, TypeKind::Composite { name: b, .. }) => a == b,
            _ => self.same_tag(other),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::String => write!(f, "string")?,
            TypeKind::Number => write!(f, "number")?,
            TypeKind::BigInt => write!(f, "bigint")?,
            TypeKind::Boolean => write!(f, "boolean")?,
            TypeKind::Date => write!(f, "Date")?,
            TypeKind::Null => return write!(f, "null"),
            TypeKind::Json => write!(f, "json")?,
            TypeKind::Unknown => write!(f, "unknown")?,
            TypeKind::Any => write!(f, "any")?,
            TypeKind::Literal { value } => write!(f, "'{}'", value)?,
            TypeKind::Composite { name, .. } => write!(f, "{}", name)?,
            TypeKind::Array { items } => write!(f, "Array<{}>", items)?,
            TypeKind::Union { items } => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "{}", parts.join(" | "))?
            }
            TypeKind::ObjectLiteral { items } => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|attr| format!("{}: {}", attr.name, attr.ty))
                    .collect();
                write!(f, "{{ {} }}", parts.join(", "))?
            }
            TypeKind::Optional { value } => write!(f, "{}?", value)?,
        }

        if self.nullable {
            write!(f, " | null")?;
        }
        Ok(())
    }
}

/// Which side of an operator overload a deferred lookup yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorPart {
    Left,
    Right,
    Result,
}

/// One `(left, right) -> result` overload of a binary operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorVariant {
    pub left: Type,
    pub right: Type,
    pub result: Type,
}

impl OperatorVariant {
    pub fn new(left: Type, right: Type, result: Type) -> Self {
        Self {
            left,
            right,
            result,
        }
    }
}

/// A named deferred member of an object literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeOrLoad,
}

impl LoadAttribute {
    pub fn new(name: impl Into<String>, ty: TypeOrLoad) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Deferred types: placeholders that depend on catalog data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "load", rename_all = "snake_case")]
pub enum Load {
    /// A column of one of the query's sources
    Column {
        schema: Option<String>,
        table: Option<String>,
        column: String,
        span: Span,
    },

    /// A user defined enum or composite; `Unknown` when neither exists
    Record {
        schema: Option<String>,
        name: String,
        span: Span,
    },

    /// The return type of a catalog function
    Function {
        schema: Option<String>,
        name: String,
        args: Vec<TypeOrLoad>,
        span: Span,
    },

    /// The declared type of one argument of a catalog function
    FunctionArgument {
        schema: Option<String>,
        name: String,
        args: Vec<TypeOrLoad>,
        index: usize,
        span: Span,
    },

    /// One part of a binary operator overload
    Operator {
        op: String,
        left: Box<TypeOrLoad>,
        right: Box<TypeOrLoad>,
        available: Vec<OperatorVariant>,
        part: OperatorPart,
        span: Span,
    },

    /// A postgres type name that is not built in
    Named {
        schema: Option<String>,
        name: String,
        nullable: bool,
        span: Span,
    },

    Array {
        items: Box<TypeOrLoad>,
        nullable: bool,
    },

    /// The element type of an array valued expression
    ArrayItem { value: Box<TypeOrLoad> },

    /// `(value).name`
    CompositeAccess {
        value: Box<TypeOrLoad>,
        name: String,
        span: Span,
    },

    Union { items: Vec<TypeOrLoad> },

    ObjectLiteral {
        items: Vec<LoadAttribute>,
        nullable: bool,
    },

    Optional { value: Box<TypeOrLoad> },

    /// `*` or `table.*`; only valid as a result column
    Star {
        schema: Option<String>,
        table: Option<String>,
        span: Span,
    },

    /// A cast applied to a column: nullability of the column, type of the cast
    ColumnCast {
        column: Box<TypeOrLoad>,
        value: Box<TypeOrLoad>,
    },

    /// `COALESCE`-like: non-null when any item is non-null
    Coalesce { items: Vec<TypeOrLoad> },

    /// Wraps the value in an array (`ARRAY(subquery)`, spread lists)
    AsArray {
        value: Box<TypeOrLoad>,
        nullable: bool,
    },
}

/// Either a concrete type or a deferred lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeOrLoad {
    Type(Type),
    Load(Load),
}

impl TypeOrLoad {
    pub fn is_deferred(&self) -> bool {
        matches!(self, TypeOrLoad::Load(_))
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            TypeOrLoad::Type(ty) => Some(ty),
            TypeOrLoad::Load(_) => None,
        }
    }

    /// Union of possibly deferred items; concrete when every item is
    pub fn union(items: Vec<TypeOrLoad>) -> TypeOrLoad {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            let members = match item {
                TypeOrLoad::Load(Load::Union { items }) => items,
                other => vec![other],
            };
            for member in members {
                if !flat.contains(&member) {
                    flat.push(member);
                }
            }
        }

        if flat.len() == 1 {
            return flat.remove(0);
        }

        if flat.iter().all(|item| !item.is_deferred()) {
            let types = flat
                .into_iter()
                .filter_map(|item| match item {
                    TypeOrLoad::Type(ty) => Some(ty),
                    TypeOrLoad::Load(_) => None,
                })
                .collect();
            return TypeOrLoad::Type(Type::union_of(types));
        }

        TypeOrLoad::Load(Load::Union { items: flat })
    }
}

impl From<Type> for TypeOrLoad {
    fn from(ty: Type) -> Self {
        TypeOrLoad::Type(ty)
    }
}

impl From<Load> for TypeOrLoad {
    fn from(load: Load) -> Self {
        TypeOrLoad::Load(load)
    }
}
