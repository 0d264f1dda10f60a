#![forbid(unsafe_code)]

//! Per-kind grammars turning statement criteria into dialect text.
//!
//! Each grammar walks a fixed clause table, renders every present clause with
//! the shared renderers in [`fragments`], and joins the non-empty fragments
//! with the configured separator. A statement producing fewer than two
//! fragments compiles to empty text.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::OrmConfig;
use crate::error::Result;
use crate::query::{Criteria, ParamRegistry, Sql, Statement, StatementCore, StatementKind};
use crate::schema::Schema;
use crate::value::Value;

/// Shared clause renderers.
pub mod fragments;
/// Literal rendering and parameter inlining.
pub mod literal;

/// Clause rendered by a grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Clause {
    /// `SELECT projections`
    Select,
    /// `TRAVERSE fields`
    Traverse,
    /// `INSERT`
    Insert,
    /// `UPDATE target`
    Update,
    /// `DELETE`
    Delete,
    /// `INTO target`
    Into,
    /// `FROM source`
    From,
    /// `LET $a = ...`
    Let,
    /// `WHERE ...` or `WHILE ...`
    Where,
    /// `GROUP BY`
    Group,
    /// `ORDER BY`
    Order,
    /// `SKIP`
    Skip,
    /// `LIMIT`
    Limit,
    /// `FETCHPLAN`
    FetchPlan,
    /// `TIMEOUT`
    Timeout,
    /// `LOCK`
    Lock,
    /// `PARALLEL`
    Parallel,
    /// `SET`
    Set,
    /// `INCREMENT`
    Increment,
    /// `ADD`
    Add,
    /// `REMOVE`
    Remove,
    /// `PUT`
    Put,
    /// `CONTENT`
    Content,
    /// `MERGE`
    Merge,
    /// `UPSERT`
    Upsert,
    /// `RETURN`
    Return,
    /// `STRATEGY`
    Strategy,
}

const SELECT_CLAUSES: &[Clause] = &[
    Clause::Select,
    Clause::From,
    Clause::Let,
    Clause::Where,
    Clause::Group,
    Clause::Order,
    Clause::Skip,
    Clause::Limit,
    Clause::FetchPlan,
    Clause::Timeout,
    Clause::Lock,
    Clause::Parallel,
];

const INSERT_CLAUSES: &[Clause] = &[
    Clause::Insert,
    Clause::Into,
    Clause::Set,
    Clause::From,
    Clause::Return,
];

const UPDATE_CLAUSES: &[Clause] = &[
    Clause::Update,
    Clause::Set,
    Clause::Increment,
    Clause::Add,
    Clause::Remove,
    Clause::Put,
    Clause::Content,
    Clause::Merge,
    Clause::Upsert,
    Clause::Return,
    Clause::Where,
    Clause::Lock,
    Clause::Limit,
    Clause::Timeout,
];

const DELETE_CLAUSES: &[Clause] = &[
    Clause::Delete,
    Clause::From,
    Clause::Lock,
    Clause::Return,
    Clause::Where,
    Clause::Limit,
    Clause::Timeout,
];

const TRAVERSE_CLAUSES: &[Clause] = &[
    Clause::Traverse,
    Clause::From,
    Clause::Let,
    Clause::Where,
    Clause::Limit,
    Clause::Strategy,
];

/// Mutable state of one top-level compilation, shared with every nested
/// sub-statement.
#[derive(Debug)]
pub struct CompileContext<'a> {
    /// Active configuration.
    pub config: &'a OrmConfig,
    /// Placeholder registry.
    pub params: &'a mut ParamRegistry,
    /// Schema of the statement being rendered.
    pub schema: Option<Arc<dyn Schema>>,
}

impl CompileContext<'_> {
    /// Compiles a nested statement against the shared registry, returning its
    /// text (possibly empty).
    pub fn compile_nested<S: Statement + ?Sized>(&mut self, stmt: &S) -> Result<String> {
        let grammar = grammar_for(stmt.kind());
        let mut sub = CompileContext {
            config: self.config,
            params: &mut *self.params,
            schema: stmt.schema().cloned(),
        };
        grammar.compile_core(stmt.core(), &mut sub)
    }
}

/// Compiler for one statement kind.
pub trait Grammar: Send + Sync {
    /// Statement kind handled.
    fn kind(&self) -> StatementKind;

    /// Clause table in rendering order.
    fn clauses(&self) -> &'static [Clause];

    /// Keyword introducing the condition tree.
    fn where_keyword(&self) -> &'static str {
        "WHERE"
    }

    /// Whether several record ids may be listed as `FROM [#a, #b]`.
    fn allows_rid_sources(&self) -> bool {
        true
    }

    /// Whether `clause` takes part in compiling `criteria`.
    fn is_active(&self, clause: Clause, criteria: &Criteria) -> bool {
        let _ = (clause, criteria);
        true
    }

    /// Renders one clause; `None` when absent.
    fn compile_clause(
        &self,
        clause: Clause,
        criteria: &Criteria,
        ctx: &mut CompileContext<'_>,
    ) -> Result<Option<String>> {
        fragments::render(clause, criteria, self.where_keyword(), self.allows_rid_sources(), ctx)
    }

    /// Renders the statement text against a shared context.
    fn compile_core(&self, core: &StatementCore, ctx: &mut CompileContext<'_>) -> Result<String> {
        if let Some(err) = &core.error {
            return Err(err.clone());
        }
        let criteria = &core.criteria;
        ctx.params.merge(&criteria.params);
        let mut fragments = Vec::with_capacity(self.clauses().len());
        for clause in self.clauses() {
            if !self.is_active(*clause, criteria) {
                continue;
            }
            if let Some(fragment) = self.compile_clause(*clause, criteria, ctx)? {
                if !fragment.is_empty() {
                    fragments.push(fragment);
                }
            }
        }
        if fragments.len() < 2 {
            debug!(kind = %self.kind(), fragments = fragments.len(), "grammar.compile.empty");
            return Ok(String::new());
        }
        Ok(fragments.join(ctx.config.separator.as_str()))
    }

    /// Compiles a top-level statement with a fresh registry seeded by `params`.
    fn compile(
        &self,
        core: &StatementCore,
        config: &OrmConfig,
        params: BTreeMap<String, Value>,
    ) -> Result<Sql> {
        let mut registry = ParamRegistry::new(config.param_prefix.clone());
        registry.merge(&params);
        let text = {
            let mut ctx = CompileContext {
                config,
                params: &mut registry,
                schema: core.schema.clone(),
            };
            self.compile_core(core, &mut ctx)?
        };
        let params = registry.into_params();
        trace!(kind = %self.kind(), params = params.len(), text = %text, "grammar.compile");
        Ok(Sql {
            text,
            params,
            options: core.options.clone(),
        })
    }
}

/// `SELECT` grammar.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectGrammar;

/// `INSERT` grammar; `FROM` takes a single source.
#[derive(Clone, Copy, Debug, Default)]
pub struct InsertGrammar;

/// `UPDATE` grammar; `CONTENT` and `MERGE` suppress incremental changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateGrammar;

/// `DELETE` grammar.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeleteGrammar;

/// `TRAVERSE` grammar; conditions render as `WHILE`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraverseGrammar;

impl Grammar for SelectGrammar {
    fn kind(&self) -> StatementKind {
        StatementKind::Select
    }

    fn clauses(&self) -> &'static [Clause] {
        SELECT_CLAUSES
    }
}

impl Grammar for InsertGrammar {
    fn kind(&self) -> StatementKind {
        StatementKind::Insert
    }

    fn clauses(&self) -> &'static [Clause] {
        INSERT_CLAUSES
    }

    fn allows_rid_sources(&self) -> bool {
        false
    }
}

impl Grammar for UpdateGrammar {
    fn kind(&self) -> StatementKind {
        StatementKind::Update
    }

    fn clauses(&self) -> &'static [Clause] {
        UPDATE_CLAUSES
    }

    fn is_active(&self, clause: Clause, criteria: &Criteria) -> bool {
        let has_content = criteria.content.as_ref().is_some_and(|c| !c.is_empty());
        let has_merge = criteria.merge.as_ref().is_some_and(|m| !m.is_empty());
        match clause {
            Clause::Set | Clause::Increment | Clause::Add | Clause::Remove | Clause::Put => {
                !(has_content || has_merge)
            }
            Clause::Merge => !has_content,
            _ => true,
        }
    }
}

impl Grammar for DeleteGrammar {
    fn kind(&self) -> StatementKind {
        StatementKind::Delete
    }

    fn clauses(&self) -> &'static [Clause] {
        DELETE_CLAUSES
    }
}

impl Grammar for TraverseGrammar {
    fn kind(&self) -> StatementKind {
        StatementKind::Traverse
    }

    fn clauses(&self) -> &'static [Clause] {
        TRAVERSE_CLAUSES
    }

    fn where_keyword(&self) -> &'static str {
        "WHILE"
    }
}

static SELECT: SelectGrammar = SelectGrammar;
static INSERT: InsertGrammar = InsertGrammar;
static UPDATE: UpdateGrammar = UpdateGrammar;
static DELETE: DeleteGrammar = DeleteGrammar;
static TRAVERSE: TraverseGrammar = TraverseGrammar;

/// Grammar compiling statements of `kind`.
pub fn grammar_for(kind: StatementKind) -> &'static dyn Grammar {
    match kind {
        StatementKind::Select => &SELECT,
        StatementKind::Insert => &INSERT,
        StatementKind::Update => &UPDATE,
        StatementKind::Delete => &DELETE,
        StatementKind::Traverse => &TRAVERSE,
    }
}
