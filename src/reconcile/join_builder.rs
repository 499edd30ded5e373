//! Join construction from a target table back to its dependents.

use crate::catalog::ModelDef;
use crate::datastore::Datastore;
use crate::resolver::StaticTrace;
use std::collections::HashSet;

/// Joins leading from one target model to the dependent rows counted on it.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinPlan {
    /// Quoted alias of the target table.
    pub target_alias: String,
    /// `JOIN ... ON ...` clauses, outermost first.
    pub joins: Vec<String>,
    /// Quoted alias of the dependent table, the last join.
    pub dependent_alias: String,
}

impl JoinPlan {
    /// Append `condition` to the last join's `ON` clause.
    pub fn restrict_last(&mut self, condition: &str) {
        if let Some(last) = self.joins.last_mut() {
            last.push_str(&format!(" AND ({})", condition));
        }
    }
}

/// How the previous joined relation identifies its own type.
enum TypeExpr {
    /// A single known model.
    Literal(String),
    /// A `next_join_type` column of a union subquery.
    Column(String),
}

/// Builds the join chain for one reachable target of a traced counter.
///
/// Hops are walked from the target back to the dependent. The hop next to
/// the dependent joins the real dependent table; a self-join gets the alias
/// `<table>_<table>`. Inner hops that are polymorphic, or that several
/// intermediate models share, become a `UNION ALL` subquery aliased
/// `join_query_<relation>` exposing the key columns plus the source model's
/// type tag as `next_join_type`.
pub struct JoinBuilder<'q, D: Datastore + ?Sized> {
    store: &'q D,
    trace: &'q StaticTrace<'q>,
    inner: bool,
}

impl<'q, D: Datastore + ?Sized> JoinBuilder<'q, D> {
    pub fn new(store: &'q D, trace: &'q StaticTrace<'q>) -> Self {
        Self {
            store,
            trace,
            inner: false,
        }
    }

    /// Use inner joins. Targets with no dependents then drop out of the
    /// result instead of computing to zero.
    pub fn inner(mut self, inner: bool) -> Self {
        self.inner = inner;
        self
    }

    pub fn build(&self, target: &ModelDef) -> JoinPlan {
        let q = |ident: &str| self.store.quote_identifier(ident);
        let keyword = if self.inner { "INNER JOIN" } else { "LEFT JOIN" };

        let mut used = HashSet::new();
        used.insert(target.table.clone());

        let target_alias = q(&target.table);
        let mut prev_alias = target_alias.clone();
        let mut prev_key = q(&target.primary_key);
        let mut prev_type = TypeExpr::Literal(target.type_tag.clone());
        let mut joins = Vec::with_capacity(self.trace.hops.len());
        let mut dependent_alias = String::new();

        for (position, hop) in self.trace.hops.iter().enumerate().rev() {
            let type_check = |alias: &str, column: &str, prev_type: &TypeExpr| {
                let expected = match prev_type {
                    TypeExpr::Literal(tag) => self.store.quote_literal(tag),
                    TypeExpr::Column(column) => column.clone(),
                };
                format!(" AND {}.{} = {}", alias, q(column), expected)
            };

            if position == 0 {
                let Some((dependent, relation)) = hop.sources.first() else {
                    break;
                };
                let alias = q(&unique_alias(&mut used, &dependent.table));
                let mut on = format!("{}.{} = {}.{}", alias, q(&relation.foreign_key), prev_alias, prev_key);
                if let Some(foreign_type) = relation.foreign_type() {
                    on.push_str(&type_check(&alias, foreign_type, &prev_type));
                }
                joins.push(format!("{} {} AS {} ON {}", keyword, q(&dependent.table), alias, on));
                dependent_alias = alias;
                break;
            }

            let polymorphic = hop.is_polymorphic();
            if !polymorphic && hop.sources.len() == 1 {
                let (source, relation) = hop.sources[0];
                let alias = q(&unique_alias(&mut used, &source.table));
                joins.push(format!(
                    "{} {} AS {} ON {}.{} = {}.{}",
                    keyword,
                    q(&source.table),
                    alias,
                    alias,
                    q(&relation.foreign_key),
                    prev_alias,
                    prev_key
                ));
                prev_alias = alias;
                prev_key = q(&source.primary_key);
                prev_type = TypeExpr::Literal(source.type_tag.clone());
                continue;
            }

            let name = hop
                .sources
                .first()
                .map(|(_, relation)| relation.name.clone())
                .unwrap_or_default();
            let alias = q(&unique_alias(&mut used, &format!("join_query_{}", name)));
            let selects: Vec<String> = hop
                .sources
                .iter()
                .map(|(source, relation)| {
                    let table = q(&source.table);
                    let mut columns = vec![
                        format!("{}.{} AS {}", table, q(&source.primary_key), q("primary_key")),
                        format!("{}.{} AS {}", table, q(&relation.foreign_key), q("foreign_key")),
                    ];
                    if let Some(foreign_type) = relation.foreign_type() {
                        columns.push(format!("{}.{} AS {}", table, q(foreign_type), q("foreign_type")));
                    }
                    columns.push(format!(
                        "{} AS {}",
                        self.store.quote_literal(&source.type_tag),
                        q("next_join_type")
                    ));
                    format!("SELECT {} FROM {}", columns.join(", "), table)
                })
                .collect();

            let mut on = format!("{}.{} = {}.{}", alias, q("foreign_key"), prev_alias, prev_key);
            if polymorphic {
                on.push_str(&type_check(&alias, "foreign_type", &prev_type));
            }
            joins.push(format!(
                "{} ({}) AS {} ON {}",
                keyword,
                selects.join(" UNION ALL "),
                alias,
                on
            ));
            prev_type = TypeExpr::Column(format!("{}.{}", alias, q("next_join_type")));
            prev_alias = alias;
            prev_key = q("primary_key");
        }

        JoinPlan {
            target_alias,
            joins,
            dependent_alias,
        }
    }
}

/// `base`, or `<base>_<base>` (then numbered) if already taken.
fn unique_alias(used: &mut HashSet<String>, base: &str) -> String {
    let mut alias = base.to_string();
    if used.contains(&alias) {
        alias = format!("{}_{}", base, base);
    }
    let mut n = 2;
    while used.contains(&alias) {
        alias = format!("{}_{}_{}", base, base, n);
        n += 1;
    }
    used.insert(alias.clone());
    alias
}
