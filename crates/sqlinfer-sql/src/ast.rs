//! SQL abstract syntax tree
//!
//! Every node carries the byte span it was parsed from. Nodes with a fixed
//! shape use named fields; `SELECT` keeps its optional clauses as an ordered
//! list of [`SelectClause`]s.

use serde::{Deserialize, Serialize};
use sqlinfer_core::Span;

/// An identifier; unquoted identifiers are folded to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub value: String,
    pub quoted: bool,
    pub span: Span,
}

impl Ident {
    pub fn new(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            quoted: false,
            span,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// `name` or `schema.name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectName {
    pub schema: Option<Ident>,
    pub name: Ident,
    pub span: Span,
}

impl ObjectName {
    pub fn schema_str(&self) -> Option<&str> {
        self.schema.as_ref().map(Ident::as_str)
    }

    pub fn name_str(&self) -> &str {
        self.name.as_str()
    }
}

/// A whole statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "lowercase")]
pub enum Statement {
    Query(Box<Query>),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
    Transaction(Transaction),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Query(query) => query.span,
            Statement::Insert(insert) => insert.span,
            Statement::Update(update) => update.span,
            Statement::Delete(delete) => delete.span,
            Statement::Transaction(transaction) => transaction.span,
        }
    }
}

/// `WITH [RECURSIVE] cte, ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct With {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
    pub span: Span,
}

/// `name [(col, ...)] AS [NOT] [MATERIALIZED] (body)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    pub name: Ident,
    pub columns: Vec<Ident>,
    pub body: CteBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CteBody {
    Query(Box<Query>),
    Values(Values),
    Insert(Box<Insert>),
    Update(Box<Update>),
    Delete(Box<Delete>),
}

/// A full query expression with its trailing clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub with: Option<With>,
    pub body: SetExpr,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub locking: Vec<Locking>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetExpr {
    Select(Box<Select>),
    Values(Values),
    /// A parenthesized query used as a set operand
    Nested(Box<Query>),
    Operation {
        op: SetOperator,
        all: bool,
        left: Box<SetExpr>,
        right: Box<SetExpr>,
        span: Span,
    },
}

impl SetExpr {
    /// The left-most `SELECT`/`VALUES` branch, which names the result columns
    pub fn leftmost(&self) -> &SetExpr {
        match self {
            SetExpr::Operation { left, .. } => left.leftmost(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// `FOR UPDATE`, `FOR SHARE`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locking {
    pub strength: String,
    pub of: Vec<ObjectName>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distinct {
    All,
    Distinct,
    On(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub distinct: Option<Distinct>,
    pub items: Vec<SelectItem>,
    pub clauses: Vec<SelectClause>,
    pub span: Span,
}

impl Select {
    pub fn from(&self) -> &[TableWithJoins] {
        self.clauses
            .iter()
            .find_map(|clause| match clause {
                SelectClause::From(from) => Some(from.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn selection(&self) -> Option<&Expr> {
        self.clauses.iter().find_map(|clause| match clause {
            SelectClause::Where(expr) => Some(expr),
            _ => None,
        })
    }
}

/// Optional clauses of a `SELECT`, in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectClause {
    From(Vec<TableWithJoins>),
    Where(Expr),
    GroupBy(Vec<Expr>),
    Having(Expr),
    Window(Vec<NamedWindow>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedWindow {
    pub name: Ident,
    pub spec: WindowSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// `*` or `qualifier.*`
    Wildcard {
        qualifier: Option<ObjectName>,
        span: Span,
    },
    Expr {
        expr: Expr,
        alias: Option<Ident>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    pub expr: Expr,
    pub descending: bool,
    pub nulls_first: Option<bool>,
}

/// `VALUES (a, b), (c, d)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Values {
    pub rows: Vec<Vec<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAlias {
    pub name: Ident,
    pub columns: Vec<Ident>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableFactor {
    Table {
        name: ObjectName,
        alias: Option<TableAlias>,
        span: Span,
    },
    /// A subquery or `VALUES` list in `FROM`
    Derived {
        lateral: bool,
        subquery: Box<Query>,
        alias: Option<TableAlias>,
        span: Span,
    },
    /// A set returning function in `FROM`
    Function {
        lateral: bool,
        call: FunctionCall,
        alias: Option<TableAlias>,
        span: Span,
    },
    /// `( table_with_joins )`
    Nested {
        table: Box<TableWithJoins>,
        alias: Option<TableAlias>,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableWithJoins {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<Ident>),
    Natural,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub relation: TableFactor,
    pub constraint: JoinConstraint,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub with: Option<With>,
    pub table: ObjectName,
    pub alias: Option<Ident>,
    pub columns: Vec<Ident>,
    pub source: InsertSource,
    pub on_conflict: Option<OnConflict>,
    pub returning: Vec<SelectItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsertSource {
    Values(Values),
    /// `VALUES $$rows(a, b)`
    Param(ParamRef),
    Query(Box<Query>),
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConflictTarget {
    Columns(Vec<Ident>),
    Constraint(Ident),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConflictAction {
    Nothing,
    Update {
        assignments: Vec<Assignment>,
        selection: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnConflict {
    pub target: Option<ConflictTarget>,
    pub action: ConflictAction,
    pub span: Span,
}

/// `col = value` or `(a, b) = (value, value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub columns: Vec<Ident>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub with: Option<With>,
    pub table: ObjectName,
    pub alias: Option<Ident>,
    pub assignments: Vec<Assignment>,
    pub from: Vec<TableWithJoins>,
    pub selection: Option<Expr>,
    pub returning: Vec<SelectItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub with: Option<With>,
    pub table: ObjectName,
    pub alias: Option<Ident>,
    pub using: Vec<TableWithJoins>,
    pub selection: Option<Expr>,
    pub returning: Vec<SelectItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionKind {
    Begin,
    Commit,
    Rollback { savepoint: Option<Ident> },
    Savepoint(Ident),
    Release(Ident),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub span: Span,
}

/// A parameter reference: `$name`, `$name!`, `$$name`, `$$name(a, b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRef {
    pub name: String,
    pub required: bool,
    pub spread: bool,
    pub pick: Vec<Ident>,
    pub span: Span,
}

/// A type name in a cast or typed literal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    pub schema: Option<String>,

    /// Lowercased name, multi-word names joined by a space (`double precision`)
    pub name: String,

    /// Raw modifiers such as `255` in `varchar(255)`
    pub modifiers: Vec<String>,

    /// Array dimensions from `[]` suffixes or a trailing `ARRAY`
    pub array_dims: usize,

    pub span: Span,
}

impl DataType {
    /// The full type spelling, e.g. `int4[]`
    pub fn pg_name(&self) -> String {
        let mut name = match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        };
        for _ in 0..self.array_dims {
            name.push_str("[]");
        }
        name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric literal as written
    Number(String),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsTest {
    Null,
    True,
    False,
    Unknown,
    DistinctFrom(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LikeKind {
    Like,
    ILike,
    SimilarTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    Any,
    All,
}

/// `AND`, `OR` and symbolic operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// `AND`, `OR` or the operator token (`+`, `->>`, `<>`)
    pub op: String,
    pub span: Span,
}

/// Right side of `op ANY (...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuantifiedTarget {
    Subquery(Box<Query>),
    Expr(Box<Expr>),
}

/// `CURRENT_DATE`, `NOW`-like keywords without parentheses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentKind {
    Date,
    Time,
    Timestamp,
    LocalTime,
    LocalTimestamp,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub name: Option<Ident>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByItem>,

    /// Frame clause as written, e.g. `ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: ObjectName,
    pub args: Vec<Expr>,

    /// `count(*)`
    pub star: bool,
    pub distinct: bool,
    pub order_by: Vec<OrderByItem>,
    pub filter: Option<Box<Expr>>,
    pub over: Option<WindowSpec>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    /// `column`, `table.column` or `schema.table.column`
    Column {
        schema: Option<Ident>,
        table: Option<Ident>,
        column: Ident,
        span: Span,
    },
    Param(ParamRef),
    Unary {
        op: Operator,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
        span: Span,
    },
    Is {
        expr: Box<Expr>,
        negated: bool,
        test: IsTest,
        span: Span,
    },
    Between {
        expr: Box<Expr>,
        negated: bool,
        symmetric: bool,
        low: Box<Expr>,
        high: Box<Expr>,
        span: Span,
    },
    InList {
        expr: Box<Expr>,
        negated: bool,
        list: Vec<Expr>,
        span: Span,
    },
    InSubquery {
        expr: Box<Expr>,
        negated: bool,
        subquery: Box<Query>,
        span: Span,
    },
    /// `IN $$ids`
    InParam {
        expr: Box<Expr>,
        negated: bool,
        param: ParamRef,
        span: Span,
    },
    Like {
        expr: Box<Expr>,
        negated: bool,
        kind: LikeKind,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
        span: Span,
    },
    /// `left op ANY (...)`
    Quantified {
        left: Box<Expr>,
        op: Operator,
        quantifier: Quantifier,
        right: QuantifiedTarget,
        span: Span,
    },
    /// `expr::type` or `CAST(expr AS type)`
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
        span: Span,
    },
    /// `DATE '2020-01-01'`
    TypedString {
        data_type: DataType,
        value: String,
        span: Span,
    },
    Function(FunctionCall),
    Case {
        operand: Option<Box<Expr>>,
        whens: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
        span: Span,
    },
    Exists {
        subquery: Box<Query>,
        span: Span,
    },
    Subquery {
        query: Box<Query>,
        span: Span,
    },
    /// `ARRAY[...]`
    Array {
        elements: Vec<Expr>,
        span: Span,
    },
    /// `ARRAY(SELECT ...)`
    ArraySubquery {
        query: Box<Query>,
        span: Span,
    },
    /// `ROW(...)` or a parenthesized list `(a, b)`
    Row {
        elements: Vec<Expr>,
        span: Span,
    },
    Nested {
        expr: Box<Expr>,
        span: Span,
    },
    /// `expr[i]` or `expr[lo:hi]`
    Subscript {
        expr: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        slice: bool,
        span: Span,
    },
    /// `(composite).field`
    FieldAccess {
        expr: Box<Expr>,
        field: Ident,
        span: Span,
    },
    Extract {
        field: String,
        expr: Box<Expr>,
        span: Span,
    },
    Current {
        kind: CurrentKind,
        span: Span,
    },
    /// `DEFAULT` in `VALUES` or `SET`
    Default {
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Column { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Is { span, .. }
            | Expr::Between { span, .. }
            | Expr::InList { span, .. }
            | Expr::InSubquery { span, .. }
            | Expr::InParam { span, .. }
            | Expr::Like { span, .. }
            | Expr::Quantified { span, .. }
            | Expr::Cast { span, .. }
            | Expr::TypedString { span, .. }
            | Expr::Case { span, .. }
            | Expr::Exists { span, .. }
            | Expr::Subquery { span, .. }
            | Expr::Array { span, .. }
            | Expr::ArraySubquery { span, .. }
            | Expr::Row { span, .. }
            | Expr::Nested { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::Extract { span, .. }
            | Expr::Current { span, .. }
            | Expr::Default { span } => *span,
            Expr::Param(param) => param.span,
            Expr::Function(call) => call.span,
        }
    }

    /// Strip redundant parentheses
    pub fn unnested(&self) -> &Expr {
        match self {
            Expr::Nested { expr, .. } => expr.unnested(),
            other => other,
        }
    }
}
