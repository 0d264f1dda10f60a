//! Stateless clause renderers shared by every grammar.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::grammar::literal::{apply_params, value_to_string};
use crate::grammar::{Clause, CompileContext};
use crate::query::{
    ChangeKind, ChangeSet, Criteria, LetValue, Operator, Projection, ProjectionExpr, Source, Term,
    WhereClause,
};
use crate::rid::RecordId;
use crate::schema::ContainerKind;
use crate::value::Value;

/// Renders `clause` of `criteria`; `None` when the clause is absent.
pub fn render(
    clause: Clause,
    criteria: &Criteria,
    where_keyword: &str,
    allow_rids: bool,
    ctx: &mut CompileContext<'_>,
) -> Result<Option<String>> {
    let fragment = match clause {
        Clause::Select => match &criteria.select {
            Some(projections) => Some(select(projections, ctx)),
            None => None,
        },
        Clause::Traverse => criteria
            .traverse
            .as_ref()
            .map(|fields| format!("TRAVERSE {}", fields.join(", "))),
        Clause::Insert => criteria.insert.then(|| "INSERT".to_string()),
        Clause::Delete => criteria.delete.then(|| "DELETE".to_string()),
        Clause::Update => criteria
            .update
            .as_ref()
            .and_then(|targets| targets_fragment("UPDATE", targets, true)),
        Clause::Into => criteria
            .into
            .as_ref()
            .and_then(|targets| targets_fragment("INTO", targets, false)),
        Clause::From => match &criteria.from {
            Some(sources) => from(sources, allow_rids, ctx)?,
            None => None,
        },
        Clause::Let => match &criteria.lets {
            Some(lets) => lets_fragment(lets, ctx)?,
            None => None,
        },
        Clause::Where => where_clauses(where_keyword, &criteria.where_clauses, ctx)?,
        // The dialect accepts a single grouping field.
        Clause::Group => criteria
            .group
            .as_ref()
            .and_then(|group| group.first())
            .map(|field| format!("GROUP BY {field}")),
        Clause::Order => criteria.order.as_ref().filter(|o| !o.is_empty()).map(|order| {
            let items: Vec<String> = order
                .iter()
                .map(|item| format!("{} {}", item.property, item.direction.sql()))
                .collect();
            format!("ORDER BY {}", items.join(", "))
        }),
        Clause::Skip => criteria.skip.map(|n| format!("SKIP {n}")),
        Clause::Limit => criteria.limit.map(|n| format!("LIMIT {n}")),
        Clause::FetchPlan => criteria
            .fetch_plan
            .as_ref()
            .filter(|plan| !plan.is_empty())
            .map(|plan| {
                let items: Vec<String> = plan.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                format!("FETCHPLAN {}", items.join(" "))
            }),
        Clause::Timeout => criteria.timeout.map(|n| format!("TIMEOUT {n}")),
        Clause::Lock => criteria.lock.map(|mode| format!("LOCK {}", mode.as_str())),
        Clause::Parallel => (criteria.parallel == Some(true)).then(|| "PARALLEL".to_string()),
        Clause::Upsert => (criteria.upsert == Some(true)).then(|| "UPSERT".to_string()),
        Clause::Strategy => criteria
            .strategy
            .map(|strategy| format!("STRATEGY {}", strategy.as_str())),
        Clause::Return => criteria.returning.as_ref().map(|r| match &r.expression {
            Some(expression) => format!("RETURN {} {expression}", r.option),
            None => format!("RETURN {}", r.option),
        }),
        Clause::Set => change(ChangeKind::Set, criteria, ctx)?,
        Clause::Increment => change(ChangeKind::Increment, criteria, ctx)?,
        Clause::Add => change(ChangeKind::Add, criteria, ctx)?,
        Clause::Remove => match criteria.changes(ChangeKind::Remove) {
            Some(groups) => remove(groups, ctx)?,
            None => None,
        },
        Clause::Put => match criteria.changes(ChangeKind::Put) {
            Some(groups) => put(groups, ctx)?,
            None => None,
        },
        Clause::Content => match &criteria.content {
            Some(documents) => content("CONTENT", documents, ctx)?,
            None => None,
        },
        Clause::Merge => match &criteria.merge {
            Some(documents) => content("MERGE", documents, ctx)?,
            None => None,
        },
    };
    Ok(fragment)
}

fn select(projections: &[Projection], ctx: &mut CompileContext<'_>) -> String {
    let items: Vec<String> = projections
        .iter()
        .map(|projection| {
            let expr = match &projection.expr {
                ProjectionExpr::Field(field) => field.clone(),
                ProjectionExpr::Sql(sql) => {
                    ctx.params.merge(&sql.params);
                    sql.text.clone()
                }
            };
            let expr = match &projection.alias {
                Some(alias) => format!("{expr} AS {alias}"),
                None => expr,
            };
            apply_params(&expr, ctx.params.params())
        })
        .filter(|item| !item.is_empty())
        .collect();
    format!("SELECT {}", items.join(", "))
}

fn targets_fragment(keyword: &str, targets: &[String], allow_rids: bool) -> Option<String> {
    let first = targets.first()?;
    if allow_rids && targets.len() > 1 && RecordId::all_valid(targets) {
        return Some(format!("{keyword} [{}]", targets.join(", ")));
    }
    Some(format!("{keyword} {first}"))
}

fn from(
    sources: &[Source],
    allow_rids: bool,
    ctx: &mut CompileContext<'_>,
) -> Result<Option<String>> {
    let mut prepared = Vec::with_capacity(sources.len());
    for source in sources {
        match source {
            Source::Target(target) => prepared.push(apply_params(target, ctx.params.params())),
            Source::Query(stmt) => {
                let text = ctx.compile_nested(stmt.as_ref())?;
                if !text.is_empty() {
                    prepared.push(format!("({text})"));
                }
            }
        }
    }
    let Some(first) = prepared.first() else {
        return Ok(None);
    };
    if allow_rids && prepared.len() > 1 && RecordId::all_valid(&prepared) {
        return Ok(Some(format!("FROM [{}]", prepared.join(", "))));
    }
    Ok(Some(format!("FROM {first}")))
}

fn lets_fragment(
    lets: &[(String, LetValue)],
    ctx: &mut CompileContext<'_>,
) -> Result<Option<String>> {
    let mut items = Vec::with_capacity(lets.len());
    for (name, value) in lets {
        match value {
            LetValue::Expr(expr) => items.push(format!("LET ${name} = {expr}")),
            LetValue::Query(stmt) => {
                let text = ctx.compile_nested(stmt.as_ref())?;
                if !text.is_empty() {
                    items.push(format!("LET ${name} = ({text})"));
                }
            }
        }
    }
    Ok((!items.is_empty()).then(|| items.join(", ")))
}

fn where_clauses(
    keyword: &str,
    clauses: &[WhereClause],
    ctx: &mut CompileContext<'_>,
) -> Result<Option<String>> {
    let body = where_body(clauses, ctx)?;
    Ok((!body.is_empty()).then(|| format!("{keyword} {body}")))
}

/// Joins rendered clauses; the first non-empty one carries no connector.
fn where_body(clauses: &[WhereClause], ctx: &mut CompileContext<'_>) -> Result<String> {
    let mut parts: Vec<String> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let part = where_part(clause, ctx)?;
        if part.is_empty() {
            continue;
        }
        if parts.is_empty() {
            parts.push(part);
        } else {
            parts.push(format!("{} {part}", clause.logic().sql()));
        }
    }
    Ok(parts.join(" "))
}

fn where_part(clause: &WhereClause, ctx: &mut CompileContext<'_>) -> Result<String> {
    let part = match clause {
        WhereClause::Basic {
            path, op, value, ..
        } => {
            let value = cast_for_query(ctx, path, *op, value.clone())?;
            let rendered = match value {
                Value::List(items) => {
                    let mut tokens = bind_all(ctx, items);
                    if tokens.len() == 1 {
                        tokens.remove(0)
                    } else {
                        format!("[{}]", tokens.join(", "))
                    }
                }
                scalar => ctx.params.bind(scalar),
            };
            format!("{path} {} {rendered}", op.sql())
        }
        WhereClause::Null { path, op, .. } => format!("{path} {} NULL", op.sql()),
        WhereClause::In {
            path, op, value, ..
        } => {
            let rendered = match value {
                Term::Query(stmt) => {
                    let text = ctx.compile_nested(stmt.as_ref())?;
                    if text.is_empty() {
                        return Ok(String::new());
                    }
                    format!("({text})")
                }
                Term::Value(value) => match cast_for_query(ctx, path, *op, value.clone())? {
                    Value::List(items) => format!("[{}]", bind_all(ctx, items).join(", ")),
                    scalar => ctx.params.bind(scalar),
                },
            };
            format!("{path} {} {rendered}", op.sql())
        }
        WhereClause::Between {
            path, low, high, ..
        } => {
            let bounds = Value::List(vec![low.clone(), high.clone()]);
            let (low, high) = match cast_for_query(ctx, path, Operator::Between, bounds)? {
                Value::List(mut items) if items.len() == 2 => {
                    let high = items.remove(1);
                    (items.remove(0), high)
                }
                _ => (low.clone(), high.clone()),
            };
            let low = ctx.params.bind(low);
            let high = ctx.params.bind(high);
            format!("{path} BETWEEN {low} AND {high}")
        }
        WhereClause::Nested { criteria, .. } => {
            ctx.params.merge(&criteria.params);
            let body = where_body(&criteria.where_clauses, ctx)?;
            if body.is_empty() {
                String::new()
            } else {
                format!("({body})")
            }
        }
        WhereClause::Raw { sql, .. } => sql.clone(),
    };
    Ok(part)
}

fn bind_all(ctx: &mut CompileContext<'_>, items: Vec<Value>) -> Vec<String> {
    items.into_iter().map(|item| ctx.params.bind(item)).collect()
}

fn cast_for_query(
    ctx: &CompileContext<'_>,
    path: &str,
    op: Operator,
    value: Value,
) -> Result<Value> {
    match &ctx.schema {
        Some(schema) if schema.has_path(path) => Ok(schema.cast_for_query(path, op, value)?),
        _ => Ok(value),
    }
}

fn cast(ctx: &CompileContext<'_>, path: &str, value: Value) -> Result<Value> {
    match &ctx.schema {
        Some(schema) if schema.has_path(path) => Ok(schema.cast(path, value)?),
        _ => Ok(value),
    }
}

fn term_to_string(ctx: &mut CompileContext<'_>, path: &str, term: &Term) -> Result<Option<String>> {
    match term {
        Term::Value(value) => {
            let value = cast(ctx, path, value.clone())?;
            Ok(Some(value_to_string(&value)))
        }
        Term::Query(stmt) => {
            let text = ctx.compile_nested(stmt.as_ref())?;
            Ok((!text.is_empty()).then(|| format!("({text})")))
        }
    }
}

fn change(
    kind: ChangeKind,
    criteria: &Criteria,
    ctx: &mut CompileContext<'_>,
) -> Result<Option<String>> {
    let Some(groups) = criteria.changes(kind) else {
        return Ok(None);
    };
    let mut items = Vec::new();
    for group in groups {
        for (path, term) in group {
            if let Some(value) = term_to_string(ctx, path, term)? {
                items.push(format!("{path} = {value}"));
            }
        }
    }
    Ok((!items.is_empty()).then(|| format!("{} {}", kind.name().to_uppercase(), items.join(", "))))
}

fn remove(groups: &[ChangeSet], ctx: &mut CompileContext<'_>) -> Result<Option<String>> {
    let mut items = Vec::new();
    for group in groups {
        for (path, term) in group {
            match term {
                Term::Value(Value::List(values))
                    if values.first().is_some_and(Value::is_structured) =>
                {
                    for value in values {
                        items.push(format!("{path} = {}", value_to_string(value)));
                    }
                }
                Term::Value(value) => {
                    let value = cast_removed(ctx, path, value.clone())?;
                    items.push(format!("{path} = {}", value_to_string(&value)));
                }
                Term::Query(_) => {
                    if let Some(value) = term_to_string(ctx, path, term)? {
                        items.push(format!("{path} = {value}"));
                    }
                }
            }
        }
    }
    Ok((!items.is_empty()).then(|| format!("REMOVE {}", items.join(", "))))
}

/// Removed list elements cast by item type; map keys pass through.
fn cast_removed(ctx: &CompileContext<'_>, path: &str, value: Value) -> Result<Value> {
    let Some(schema) = &ctx.schema else {
        return Ok(value);
    };
    match schema.container_kind(path) {
        Some(ContainerKind::List | ContainerKind::Set) => match value {
            Value::List(items) => items
                .into_iter()
                .map(|item| schema.cast_item(path, item).map_err(Into::into))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            single => Ok(schema.cast_item(path, single)?),
        },
        _ => Ok(value),
    }
}

fn put(groups: &[ChangeSet], ctx: &mut CompileContext<'_>) -> Result<Option<String>> {
    let nested_set = ctx.config.dialect.put_as_nested_set;
    let mut items = Vec::new();
    for group in groups {
        for (path, term) in group {
            let Term::Value(value) = term else {
                continue;
            };
            let Value::Map(entries) = cast(ctx, path, value.clone())? else {
                continue;
            };
            for (key, entry) in &entries {
                if nested_set {
                    items.push(format!("{path}.{key} = {}", value_to_string(entry)));
                } else {
                    items.push(format!(
                        "{path} = {}, {}",
                        value_to_string(&Value::String(key.clone())),
                        value_to_string(entry)
                    ));
                }
            }
        }
    }
    if items.is_empty() {
        return Ok(None);
    }
    let keyword = if nested_set { "SET" } else { "PUT" };
    Ok(Some(format!("{keyword} {}", items.join(", "))))
}

fn content(
    keyword: &str,
    documents: &[BTreeMap<String, Value>],
    ctx: &mut CompileContext<'_>,
) -> Result<Option<String>> {
    if documents.is_empty() {
        return Ok(None);
    }
    let mut merged = BTreeMap::new();
    for document in documents {
        for (path, value) in document {
            merged.insert(path.clone(), value.clone());
        }
    }
    let mut cast_doc = BTreeMap::new();
    for (path, value) in merged {
        let value = cast(ctx, &path, value)?;
        cast_doc.insert(path, value);
    }
    Ok(Some(format!("{keyword} {}", value_to_string(&Value::Map(cast_doc)))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrmConfig;
    use crate::query::ParamRegistry;

    #[test]
    fn basic_list_values_bind_each_element() {
        let config = OrmConfig::default();
        let mut registry = ParamRegistry::new("qp");
        let mut ctx = CompileContext {
            config: &config,
            params: &mut registry,
            schema: None,
        };
        let clauses = vec![WhereClause::Basic {
            logic: crate::query::Logic::And,
            path: "tags".into(),
            op: Operator::Eq,
            value: Value::List(vec![Value::from("a"), Value::from("b")]),
        }];
        let text = where_clauses("WHERE", &clauses, &mut ctx).expect("renders");
        assert_eq!(text.as_deref(), Some("WHERE tags = [:qp0, :qp1]"));
    }

    #[test]
    fn several_record_ids_render_as_a_list() {
        let targets = vec!["#1:2".to_string(), "#1:3".to_string()];
        assert_eq!(
            targets_fragment("UPDATE", &targets, true).as_deref(),
            Some("UPDATE [#1:2, #1:3]")
        );
        let classes = vec!["User".to_string(), "Admin".to_string()];
        assert_eq!(
            targets_fragment("UPDATE", &classes, true).as_deref(),
            Some("UPDATE User")
        );
    }
}
