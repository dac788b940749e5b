// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! The typed predicate tree (§9's "heterogeneous predicate tree"): a single
//! tagged union with exhaustive matches in the validator, the lowering
//! pass, and `Display`, rather than subclass dispatch.
//!

use crate::value::Value;
use core::fmt;

/// Root query kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// `object:TYPE ...`
    Object,
    /// `trait:TYPE ...`
    Trait,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Object => write!(f, "object"),
            Kind::Trait => write!(f, "trait"),
        }
    }
}

/// Comparison operators, shared by field and `.value` predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        };
        write!(f, "{s}")
    }
}

/// Either a literal RHS value or a resolved `[[target]]` reference.
#[derive(Debug, Clone)]
pub enum Rhs {
    /// A literal scalar (identifier, string, or number-looking identifier).
    Literal(Value),
    /// A `[[target]]` reference — resolved against the object table at
    /// evaluation time, not parse time.
    Ref(String),
}

impl fmt::Display for Rhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Literal(v) => write!(f, "{v}"),
            Rhs::Ref(r) => write!(f, "[[{r}]]"),
        }
    }
}

/// Whom a navigation predicate (`parent`, `ancestor`, `refs`, ...) points
/// at: either a nested sub-query or a direct `[[target]]`.
#[derive(Debug, Clone)]
pub enum NavTarget {
    /// `name([[target]])`
    Ref(String),
    /// `name(object:... )` / `name(trait:...)`
    SubQuery(Box<Query>),
    /// `name(_)` — the outer row itself, valid only inside a pipeline
    /// assignment's sub-query (§9 "self-binding").
    SelfBinding,
}

impl fmt::Display for NavTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavTarget::Ref(r) => write!(f, "[[{r}]]"),
            NavTarget::SubQuery(q) => write!(f, "{q}"),
            NavTarget::SelfBinding => write!(f, "_"),
        }
    }
}

/// String-match function kind, shared by top-level predicates and array
/// quantifier element predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFn {
    /// `contains(.field, "s")`
    Contains,
    /// `startswith(.field, "s")`
    StartsWith,
    /// `endswith(.field, "s")`
    EndsWith,
    /// `matches(.field, /re/)`
    Matches,
}

/// Quantifier kind for array-field predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    /// `any(.field, elt-pred)`
    Any,
    /// `all(.field, elt-pred)`
    All,
    /// `none(.field, elt-pred)`
    None,
}

/// The predicate an array quantifier applies to each element (`_`).
#[derive(Debug, Clone)]
pub enum ElementPredicate {
    /// `_ OP value`
    Compare(CompareOp, Value),
    /// One of the common string predicates applied to `_`.
    StringFn {
        /// Which function.
        func: StringFn,
        /// Needle / pattern text.
        arg: String,
        /// Case sensitivity (third, optional argument; default false).
        case_sensitive: bool,
    },
}

impl fmt::Display for ElementPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementPredicate::Compare(op, value) => write!(f, "_{op}{value}"),
            ElementPredicate::StringFn {
                func,
                arg,
                case_sensitive,
            } => {
                let name = string_fn_name(*func);
                write!(f, "{name}(_,\"{arg}\"")?;
                if *case_sensitive {
                    write!(f, ",true")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Hierarchy navigation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyDir {
    /// `parent(X)` — immediate parent only.
    Parent,
    /// `ancestor(X)` — transitive closure of parent, excluding self.
    Ancestor,
    /// `child(X)` — immediate children only.
    Child,
    /// `descendant(X)` — transitive closure of child, excluding self.
    Descendant,
}

/// A node in the predicate tree. One variant per distinct evaluation
/// pathway in §4.5; validator, lowering, and `Display` all match
/// exhaustively over this union (no subclassing).
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `.field OP RHS`
    Field {
        /// Field name.
        field: String,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand side.
        rhs: Rhs,
    },
    /// `.value OP RHS` — trait-query only.
    Value {
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand side.
        rhs: Rhs,
    },
    /// `exists(.field)`
    Exists {
        /// Field name.
        field: String,
    },
    /// `contains`/`startswith`/`endswith`/`matches` applied to a field.
    StringFn {
        /// Which function.
        func: StringFn,
        /// Field name.
        field: String,
        /// Needle / pattern text.
        arg: String,
        /// Case sensitivity (default false).
        case_sensitive: bool,
    },
    /// `any`/`all`/`none` over an array field.
    Quantifier {
        /// Which quantifier.
        kind: Quantifier,
        /// Array field name.
        field: String,
        /// Per-element predicate.
        elt: ElementPredicate,
    },
    /// `content("terms")`
    Content {
        /// Search terms.
        terms: String,
    },
    /// `has(trait:...)` — object-query only.
    Has {
        /// Inner trait sub-query.
        sub_query: Box<Query>,
    },
    /// `encloses(trait:...)` — object-query only.
    Encloses {
        /// Inner trait sub-query.
        sub_query: Box<Query>,
    },
    /// `parent`/`ancestor`/`child`/`descendant` — object-query only.
    Hierarchy {
        /// Direction.
        dir: HierarchyDir,
        /// Target.
        target: NavTarget,
    },
    /// `refs([[target]])` / `refs(object:...)` — outgoing references.
    Refs {
        /// Target.
        target: NavTarget,
    },
    /// `refd([[src]])` / `refd(object|trait:...)` — incoming references.
    Refd {
        /// Target.
        target: NavTarget,
    },
    /// `on(object|[[target]])` — trait-query only: immediate parent object.
    On {
        /// Target.
        target: NavTarget,
    },
    /// `within(object|[[target]])` — trait-query only: ancestor chain.
    Within {
        /// Target.
        target: NavTarget,
    },
    /// `at(trait:...)` — trait-query only: co-located on the same line.
    At {
        /// Target: a trait sub-query, or `_` inside a pipeline assignment.
        target: NavTarget,
    },
    /// `A B` — implicit AND (juxtaposition / an explicit group).
    And(Vec<Predicate>),
    /// `A | B`
    Or(Vec<Predicate>),
    /// `!A`
    Not(Box<Predicate>),
    /// `_` used as the self-binding marker in a pipeline assignment's
    /// structural predicate (e.g. `within(_)`); only meaningful nested
    /// inside a [`NavTarget::SelfBinding`], kept as a distinct leaf so the
    /// validator can flag a stray bare `_` outside that context (§4.3 rule
    /// 4).
    SelfBindingMarker,
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Field { field, op, rhs } => write!(f, ".{field}{op}{rhs}"),
            Predicate::Value { op, rhs } => write!(f, ".value{op}{rhs}"),
            Predicate::Exists { field } => write!(f, "exists(.{field})"),
            Predicate::StringFn {
                func,
                field,
                arg,
                case_sensitive,
            } => {
                let name = string_fn_name(*func);
                write!(f, "{name}(.{field},\"{arg}\"")?;
                if *case_sensitive {
                    write!(f, ",true")?;
                }
                write!(f, ")")
            }
            Predicate::Quantifier { kind, field, elt } => {
                let name = match kind {
                    Quantifier::Any => "any",
                    Quantifier::All => "all",
                    Quantifier::None => "none",
                };
                write!(f, "{name}(.{field}, {elt})")
            }
            Predicate::Content { terms } => write!(f, "content(\"{terms}\")"),
            Predicate::Has { sub_query } => write!(f, "has({sub_query})"),
            Predicate::Encloses { sub_query } => write!(f, "encloses({sub_query})"),
            Predicate::Hierarchy { dir, target } => {
                let name = match dir {
                    HierarchyDir::Parent => "parent",
                    HierarchyDir::Ancestor => "ancestor",
                    HierarchyDir::Child => "child",
                    HierarchyDir::Descendant => "descendant",
                };
                write!(f, "{name}({target})")
            }
            Predicate::Refs { target } => write!(f, "refs({target})"),
            Predicate::Refd { target } => write!(f, "refd({target})"),
            Predicate::On { target } => write!(f, "on({target})"),
            Predicate::Within { target } => write!(f, "within({target})"),
            Predicate::At { target } => write!(f, "at({target})"),
            Predicate::And(items) => {
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(" "))
            }
            Predicate::Or(items) => {
                let parts: Vec<String> = items.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
            Predicate::Not(inner) => write!(f, "!({inner})"),
            Predicate::SelfBindingMarker => write!(f, "_"),
        }
    }
}

fn string_fn_name(func: StringFn) -> &'static str {
    match func {
        StringFn::Contains => "contains",
        StringFn::StartsWith => "startswith",
        StringFn::EndsWith => "endswith",
        StringFn::Matches => "matches",
    }
}

/// Aggregate kind for a pipeline assignment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agg {
    /// `count(...)`
    Count,
    /// `min(.field, ...)`
    Min,
    /// `max(.field, ...)`
    Max,
    /// `sum(.field, ...)`
    Sum,
}

impl fmt::Display for Agg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Agg::Count => "count",
            Agg::Min => "min",
            Agg::Max => "max",
            Agg::Sum => "sum",
        };
        write!(f, "{s}")
    }
}

/// The inner form of an aggregate's argument: a bare navigation function
/// applied to `_` (count-only, inherently self-connected), or a structural
/// sub-query that must itself contain a `_` self-binding.
#[derive(Debug, Clone)]
pub enum AggSource {
    /// `refs(_)` / `refd(_)` / `child(_)` / `descendants(_)`.
    Nav(NavFn),
    /// A full sub-query, which must reference `_` via a structural
    /// predicate (§4.2).
    SubQuery(Box<Query>),
}

/// Navigation functions usable as a bare aggregate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavFn {
    /// `refs(_)`
    Refs,
    /// `refd(_)`
    Refd,
    /// `child(_)`
    Child,
    /// `descendants(_)`
    Descendants,
}

/// `NAME = AGG(field?, source)` pipeline stage.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The computed column's name.
    pub name: String,
    /// Which aggregate.
    pub agg: Agg,
    /// Field argument, required for `min`/`max`/`sum`.
    pub field: Option<String>,
    /// The aggregate's source.
    pub source: AggSource,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    /// Ascending (default).
    Asc,
    /// Descending.
    Desc,
}

/// One pipeline stage, executed in listed order (§4.2, §4.6).
#[derive(Debug, Clone)]
pub enum PipelineStage {
    /// `NAME = AGG(...)`
    Assign(Assignment),
    /// `filter(LEFT OP RIGHT)`
    Filter {
        /// Assignment name or outer-row field name.
        left: String,
        /// Comparison operator.
        op: CompareOp,
        /// Literal to compare against.
        right: Value,
    },
    /// `sort(LEFT[, asc|desc])`
    Sort {
        /// Assignment name or outer-row field name.
        left: String,
        /// Direction (default ascending).
        dir: SortDir,
    },
    /// `limit(N)`
    Limit(u64),
}

/// The pipeline: an ordered list of stages run after predicate evaluation.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Stages, in execution order.
    pub stages: Vec<PipelineStage>,
}

/// A fully parsed query: root kind, type name, predicate tree, and
/// optional pipeline.
#[derive(Debug, Clone)]
pub struct Query {
    /// `object` or `trait`.
    pub kind: Kind,
    /// Type (or trait) name.
    pub type_name: String,
    /// The predicate tree. `None` means "match everything of this type".
    pub predicate: Option<Predicate>,
    /// Optional post-processing pipeline.
    pub pipeline: Option<Pipeline>,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.type_name)?;
        if let Some(pred) = &self.predicate {
            write!(f, " {pred}")?;
        }
        if let Some(pipeline) = &self.pipeline {
            write!(f, " |>")?;
            for stage in &pipeline.stages {
                match stage {
                    PipelineStage::Assign(a) => {
                        write!(f, " {}={}(", a.name, a.agg)?;
                        if let Some(field) = &a.field {
                            write!(f, ".{field}, ")?;
                        }
                        match &a.source {
                            AggSource::Nav(n) => write!(f, "{}(_))", nav_fn_name(*n))?,
                            AggSource::SubQuery(q) => write!(f, "{{{q}}})")?,
                        }
                    }
                    PipelineStage::Filter { left, op, right } => {
                        write!(f, " filter({left}{op}{right})")?
                    }
                    PipelineStage::Sort { left, dir } => {
                        let d = match dir {
                            SortDir::Asc => "asc",
                            SortDir::Desc => "desc",
                        };
                        write!(f, " sort({left}, {d})")?
                    }
                    PipelineStage::Limit(n) => write!(f, " limit({n})")?,
                }
            }
        }
        Ok(())
    }
}

fn nav_fn_name(nav: NavFn) -> &'static str {
    match nav {
        NavFn::Refs => "refs",
        NavFn::Refd => "refd",
        NavFn::Child => "child",
        NavFn::Descendants => "descendants",
    }
}
