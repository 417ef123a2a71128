//! Pushes a host engine's filter expressions down into T-SQL `WHERE` text.
//!
//! Encoding is best-effort: every expression node reports whether it (and
//! everything under it) was fully represented in the generated SQL via
//! [`Encoded::supported`]. A host engine should still apply its own
//! post-filter over the results using the original expression — an
//! unsupported predicate here must never silently drop rows, it just means
//! the server-side predicate alone isn't sufficient.
//!
//! Conjunction and disjunction are handled asymmetrically, same as typical
//! predicate pushdown: an `AND` can push down the subset of its children
//! that are supported and let the host engine re-check the rest, but an
//! `OR` is only safe to push down if *every* branch is supported — pushing
//! part of an `OR` down and dropping the rest would silently exclude rows
//! that only the dropped branch would have matched.

use mssql_types::SqlValue;

use crate::bridge::{HostEngineBridge, PkInfo};
use crate::rowid::RowId;
use crate::value_serializer::serialize_literal;

/// Recursion guard. Filter trees built by query planners are sometimes deep
/// and occasionally cyclic due to planner bugs upstream; bail out rather
/// than overflow the stack trying to encode one.
pub const MAX_DEPTH: usize = 100;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// A scalar function a predicate can call, mapped to its T-SQL equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterFunction {
    /// `LOWER(x)`
    Lower,
    /// `UPPER(x)`
    Upper,
    /// `LEN(x)`
    Length,
    /// `LTRIM(RTRIM(x))`
    Trim,
    /// `x LIKE 'prefix%'`
    Prefix,
    /// `x LIKE '%suffix'`
    Suffix,
    /// `x LIKE '%contains%'`
    Contains,
    /// Case-insensitive prefix match.
    IPrefix,
    /// Case-insensitive suffix match.
    ISuffix,
    /// Case-insensitive contains match.
    IContains,
}

/// A filter expression a host engine wants pushed down to the server.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Reference to a projected column, by host engine column id.
    Column(i64),
    /// A literal value.
    Literal(SqlValue),
    /// A binary comparison.
    Compare {
        /// The operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Conjunction. Partially pushable: unsupported children are dropped,
    /// not hoisted up as unsupported.
    And(Vec<Expr>),
    /// Disjunction. All-or-nothing: unsupported if any child is.
    Or(Vec<Expr>),
    /// Negation.
    Not(Box<Expr>),
    /// A scalar function call over string arguments.
    Function {
        /// Which function.
        func: FilterFunction,
        /// Function arguments.
        args: Vec<Expr>,
    },
}

/// The result of encoding an [`Expr`] (or part of one).
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Generated T-SQL text. Empty if nothing could be encoded.
    pub sql: String,
    /// Whether `sql` fully represents the source expression. `false` means
    /// the host engine must still apply its own filter over the results.
    pub supported: bool,
}

impl Encoded {
    fn unsupported() -> Self {
        Self { sql: String::new(), supported: false }
    }

    fn supported(sql: String) -> Self {
        Self { sql, supported: true }
    }
}

/// Encoding context: which columns are in scope, the table's primary key
/// (for rowid pushdown), and a recursion depth guard.
#[derive(Debug, Clone)]
pub struct FilterContext<'a> {
    bridge: &'a HostEngineBridge,
    depth: usize,
}

impl<'a> FilterContext<'a> {
    /// Start a fresh encoding context for `bridge`.
    #[must_use]
    pub fn new(bridge: &'a HostEngineBridge) -> Self {
        Self { bridge, depth: 0 }
    }

    /// A context one level deeper, for recursing into a child expression.
    #[must_use]
    pub fn child(&self) -> Self {
        Self { bridge: self.bridge, depth: self.depth + 1 }
    }

    fn too_deep(&self) -> bool {
        self.depth >= MAX_DEPTH
    }

    fn pk(&self) -> Option<&PkInfo> {
        self.bridge.pk_info()
    }

    fn quoted_column(&self, id: i64) -> Option<String> {
        self.bridge.column_name(id).map(|name| format!("[{name}]"))
    }
}

/// Encode `expr` into T-SQL text under `ctx`.
pub fn encode(expr: &Expr, ctx: &FilterContext<'_>) -> Encoded {
    if ctx.too_deep() {
        return Encoded::unsupported();
    }

    match expr {
        Expr::Column(id) => encode_column(*id, ctx),
        Expr::Literal(value) => match serialize_literal(value) {
            Ok(sql) => Encoded::supported(sql),
            Err(_) => Encoded::unsupported(),
        },
        Expr::Compare { op, left, right } => encode_compare(*op, left, right, ctx),
        Expr::And(children) => encode_and(children, ctx),
        Expr::Or(children) => encode_or(children, ctx),
        Expr::Not(inner) => encode_not(inner, ctx),
        Expr::Function { func, args } => encode_function(*func, args, ctx),
    }
}

fn encode_column(id: i64, ctx: &FilterContext<'_>) -> Encoded {
    if HostEngineBridge::is_rowid_column(id) {
        return match ctx.pk() {
            Some(pk) if !pk.is_composite() => {
                let col = &pk.columns[0];
                Encoded::supported(format!("[{col}]"))
            }
            // A composite rowid has no single column reference; it can
            // only be expanded in the context of an equality comparison
            // (see encode_compare), not referenced bare.
            _ => Encoded::unsupported(),
        };
    }

    match ctx.quoted_column(id) {
        Some(sql) => Encoded::supported(sql),
        None => Encoded::unsupported(),
    }
}

fn encode_compare(op: CompareOp, left: &Expr, right: &Expr, ctx: &FilterContext<'_>) -> Encoded {
    let left_enc = encode(left, &ctx.child());
    let right_enc = encode(right, &ctx.child());
    if !left_enc.supported || !right_enc.supported {
        return Encoded::unsupported();
    }
    Encoded::supported(format!("({} {} {})", left_enc.sql, op.sql(), right_enc.sql))
}

/// Build the `Expr` for `rowid = <id>` against `bridge`, handling both
/// scalar and composite primary keys.
///
/// A scalar primary key's rowid is usable as an ordinary column reference
/// (`[id] = 42`); a composite key's rowid only has meaning as an equality,
/// decomposed into an `AND` of per-column equalities since there's no
/// single T-SQL expression for "this row's composite key equals this
/// tuple" outside of that expansion.
#[must_use]
pub fn rowid_equality_expr(id: &RowId, bridge: &HostEngineBridge) -> Option<Expr> {
    let pk = bridge.pk_info()?;
    match id {
        RowId::Scalar(value) => {
            let column = pk.columns.first()?;
            let column_id = bridge.columns.iter().find(|c| &c.name == column)?.id;
            Some(Expr::Compare {
                op: CompareOp::Eq,
                left: Box::new(Expr::Column(column_id)),
                right: Box::new(Expr::Literal(value.clone())),
            })
        }
        RowId::Composite(values) => {
            if values.len() != pk.columns.len() {
                return None;
            }
            let mut clauses = Vec::with_capacity(values.len());
            for (column, value) in pk.columns.iter().zip(values.iter()) {
                let column_id = bridge.columns.iter().find(|c| &c.name == column)?.id;
                clauses.push(Expr::Compare {
                    op: CompareOp::Eq,
                    left: Box::new(Expr::Column(column_id)),
                    right: Box::new(Expr::Literal(value.clone())),
                });
            }
            Some(Expr::And(clauses))
        }
    }
}

fn encode_and(children: &[Expr], ctx: &FilterContext<'_>) -> Encoded {
    let mut clauses = Vec::new();
    for child in children {
        let encoded = encode(child, &ctx.child());
        if encoded.supported && !encoded.sql.is_empty() {
            clauses.push(encoded.sql);
        }
    }
    if clauses.is_empty() {
        return Encoded::unsupported();
    }
    // Partial pushdown: report `supported` only if every child made it in,
    // so the caller knows whether it still needs to re-check anything.
    let fully_supported = clauses.len() == children.len();
    Encoded {
        sql: format!("({})", clauses.join(" AND ")),
        supported: fully_supported,
    }
}

fn encode_or(children: &[Expr], ctx: &FilterContext<'_>) -> Encoded {
    let mut clauses = Vec::with_capacity(children.len());
    for child in children {
        let encoded = encode(child, &ctx.child());
        if !encoded.supported {
            return Encoded::unsupported();
        }
        clauses.push(encoded.sql);
    }
    Encoded::supported(format!("({})", clauses.join(" OR ")))
}

fn encode_not(inner: &Expr, ctx: &FilterContext<'_>) -> Encoded {
    let encoded = encode(inner, &ctx.child());
    if !encoded.supported {
        return Encoded::unsupported();
    }
    Encoded::supported(format!("(NOT {})", encoded.sql))
}

fn encode_function(func: FilterFunction, args: &[Expr], ctx: &FilterContext<'_>) -> Encoded {
    match func {
        FilterFunction::Lower | FilterFunction::Upper | FilterFunction::Length | FilterFunction::Trim => {
            encode_unary_function(func, args, ctx)
        }
        FilterFunction::Prefix
        | FilterFunction::Suffix
        | FilterFunction::Contains
        | FilterFunction::IPrefix
        | FilterFunction::ISuffix
        | FilterFunction::IContains => encode_like(func, args, ctx),
    }
}

fn encode_unary_function(func: FilterFunction, args: &[Expr], ctx: &FilterContext<'_>) -> Encoded {
    let [arg] = args else { return Encoded::unsupported() };
    let arg_enc = encode(arg, &ctx.child());
    if !arg_enc.supported {
        return Encoded::unsupported();
    }
    let sql = match func {
        FilterFunction::Lower => format!("LOWER({})", arg_enc.sql),
        FilterFunction::Upper => format!("UPPER({})", arg_enc.sql),
        FilterFunction::Length => format!("LEN({})", arg_enc.sql),
        FilterFunction::Trim => format!("LTRIM(RTRIM({}))", arg_enc.sql),
        _ => unreachable!("non-unary function routed to encode_unary_function"),
    };
    Encoded::supported(sql)
}

fn encode_like(func: FilterFunction, args: &[Expr], ctx: &FilterContext<'_>) -> Encoded {
    let [haystack, Expr::Literal(SqlValue::String(needle))] = args else {
        return Encoded::unsupported();
    };
    let haystack_enc = encode(haystack, &ctx.child());
    if !haystack_enc.supported {
        return Encoded::unsupported();
    }

    let pattern = escape_like_pattern(needle);
    let (case_insensitive, pattern_sql) = match func {
        FilterFunction::Prefix => (false, format!("{pattern}%")),
        FilterFunction::Suffix => (false, format!("%{pattern}")),
        FilterFunction::Contains => (false, format!("%{pattern}%")),
        FilterFunction::IPrefix => (true, format!("{pattern}%")),
        FilterFunction::ISuffix => (true, format!("%{pattern}")),
        FilterFunction::IContains => (true, format!("%{pattern}%")),
        _ => unreachable!("non-LIKE function routed to encode_like"),
    };

    let column_sql = if case_insensitive {
        format!("LOWER({})", haystack_enc.sql)
    } else {
        haystack_enc.sql.clone()
    };
    let pattern_literal = if case_insensitive { pattern_sql.to_lowercase() } else { pattern_sql };

    Encoded::supported(format!("{column_sql} LIKE N'{pattern_literal}' ESCAPE '\\'"))
}

/// Escape T-SQL `LIKE` wildcard characters (`%`, `_`, `[`) in a literal
/// substring, so a `contains("50%")` filter doesn't turn into a wildcard.
fn escape_like_pattern(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(ch, '%' | '_' | '[' | '\\') {
            out.push('\\');
        }
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::HostColumn;

    fn bridge() -> HostEngineBridge {
        HostEngineBridge::new(
            vec![HostColumn::new("id", 0), HostColumn::new("name", 1)],
            Some(PkInfo::new(vec!["id".to_string()])),
        )
    }

    #[test]
    fn simple_equality_is_supported() {
        let bridge = bridge();
        let ctx = FilterContext::new(&bridge);
        let expr = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Literal(SqlValue::Int(5))),
        };
        let encoded = encode(&expr, &ctx);
        assert!(encoded.supported);
        assert_eq!(encoded.sql, "([id] = 5)");
    }

    #[test]
    fn and_pushes_down_supported_subset() {
        let bridge = bridge();
        let ctx = FilterContext::new(&bridge);
        let supported = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Literal(SqlValue::Int(5))),
        };
        let unsupported = Expr::Column(999);
        let expr = Expr::And(vec![supported, unsupported]);
        let encoded = encode(&expr, &ctx);
        assert!(!encoded.supported);
        assert_eq!(encoded.sql, "([id] = 5)");
    }

    #[test]
    fn or_is_all_or_nothing() {
        let bridge = bridge();
        let ctx = FilterContext::new(&bridge);
        let supported = Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(Expr::Column(0)),
            right: Box::new(Expr::Literal(SqlValue::Int(5))),
        };
        let unsupported = Expr::Column(999);
        let expr = Expr::Or(vec![supported, unsupported]);
        let encoded = encode(&expr, &ctx);
        assert!(!encoded.supported);
        assert!(encoded.sql.is_empty());
    }

    #[test]
    fn scalar_rowid_resolves_to_pk_column() {
        let bridge = bridge();
        let ctx = FilterContext::new(&bridge);
        let rowid = RowId::Scalar(SqlValue::Int(42));
        let expr = rowid_equality_expr(&rowid, &bridge).unwrap();
        let encoded = encode(&expr, &ctx);
        assert!(encoded.supported);
        assert_eq!(encoded.sql, "([id] = 42)");
    }

    #[test]
    fn composite_rowid_expands_to_and_of_equalities() {
        let bridge = HostEngineBridge::new(
            vec![HostColumn::new("a", 0), HostColumn::new("b", 1)],
            Some(PkInfo::new(vec!["a".to_string(), "b".to_string()])),
        );
        let ctx = FilterContext::new(&bridge);
        let rowid = RowId::Composite(vec![SqlValue::Int(1), SqlValue::Int(2)]);
        let expr = rowid_equality_expr(&rowid, &bridge).unwrap();
        let encoded = encode(&expr, &ctx);
        assert!(encoded.supported);
        assert_eq!(encoded.sql, "(([a] = 1) AND ([b] = 2))");
    }

    #[test]
    fn contains_escapes_wildcards_and_wraps_percent() {
        let bridge = bridge();
        let ctx = FilterContext::new(&bridge);
        let expr = Expr::Function {
            func: FilterFunction::Contains,
            args: vec![Expr::Column(1), Expr::Literal(SqlValue::String("50%".to_string()))],
        };
        let encoded = encode(&expr, &ctx);
        assert!(encoded.supported);
        assert_eq!(encoded.sql, "[name] LIKE N'%50\\%%' ESCAPE '\\'");
    }

    #[test]
    fn too_deep_is_unsupported() {
        let bridge = bridge();
        let mut ctx = FilterContext::new(&bridge);
        for _ in 0..MAX_DEPTH {
            ctx = ctx.child();
        }
        let expr = Expr::Literal(SqlValue::Int(1));
        assert!(!encode(&expr, &ctx).supported);
    }
}
