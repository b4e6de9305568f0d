//! Rule-based logical optimizer.
//!
//! Rules rewrite a node when they apply and leave it alone otherwise. The
//! optimizer walks the tree top-down and restarts after every rewrite, so
//! it reaches a fixed point where no rule fires anywhere. Every rule only
//! moves work into a relation whose table advertises the capability, which
//! keeps optimized and unoptimized plans row-for-row equivalent.

use crate::common::error::PipeQueryResult;
use crate::expression::expression::Expression;
use crate::planner::logical_plan::{Filter, LogicalPlan};
use log::debug;

/// Result of offering a plan node to a rule
pub enum RewriteOutcome {
    /// The rule did not apply; the node is handed back untouched
    Unchanged(LogicalPlan),
    /// The rule produced a replacement node
    Replaced(LogicalPlan),
}

pub trait RewriteRule {
    fn name(&self) -> &'static str;

    fn apply(&self, plan: LogicalPlan) -> PipeQueryResult<RewriteOutcome>;
}

pub struct LogicalOptimizer {
    rules: Vec<Box<dyn RewriteRule>>,
}

impl LogicalOptimizer {
    /// Optimizer with the standard pushdown rules. Filter merging runs
    /// first so later merges see the narrowed relation.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(MergeFilterIntoRelation),
                Box::new(MergeAggregationIntoRelation),
                Box::new(MergeSortIntoRelation),
                Box::new(MergeLimitIntoRelation),
                Box::new(MergeProjectIntoRelation),
            ],
        }
    }

    pub fn with_rules(rules: Vec<Box<dyn RewriteRule>>) -> Self {
        Self { rules }
    }

    pub fn optimize(&self, mut plan: LogicalPlan) -> PipeQueryResult<LogicalPlan> {
        loop {
            let (next, changed) = self.rewrite_pass(plan)?;
            plan = next;
            if !changed {
                return Ok(plan);
            }
        }
    }

    /// One top-down pass; stops at the first rewrite so the caller can
    /// restart from the root
    fn rewrite_pass(&self, mut plan: LogicalPlan) -> PipeQueryResult<(LogicalPlan, bool)> {
        for rule in &self.rules {
            match rule.apply(plan)? {
                RewriteOutcome::Replaced(replacement) => {
                    debug!("optimizer rule fired: {}", rule.name());
                    return Ok((replacement, true));
                }
                RewriteOutcome::Unchanged(unchanged) => plan = unchanged,
            }
        }
        self.rewrite_child(plan)
    }

    fn rewrite_child(&self, plan: LogicalPlan) -> PipeQueryResult<(LogicalPlan, bool)> {
        macro_rules! descend {
            ($variant:ident, $node:ident) => {{
                let mut node = $node;
                let (child, changed) = self.rewrite_pass(*node.child)?;
                node.child = Box::new(child);
                Ok((LogicalPlan::$variant(node), changed))
            }};
        }
        match plan {
            LogicalPlan::Relation(_) | LogicalPlan::Values(_) => Ok((plan, false)),
            LogicalPlan::Filter(node) => descend!(Filter, node),
            LogicalPlan::Project(node) => descend!(Project, node),
            LogicalPlan::Remove(node) => descend!(Remove, node),
            LogicalPlan::Rename(node) => descend!(Rename, node),
            LogicalPlan::Eval(node) => descend!(Eval, node),
            LogicalPlan::Aggregation(node) => descend!(Aggregation, node),
            LogicalPlan::Window(node) => descend!(Window, node),
            LogicalPlan::RareTopN(node) => descend!(RareTopN, node),
            LogicalPlan::Dedupe(node) => descend!(Dedupe, node),
            LogicalPlan::Sort(node) => descend!(Sort, node),
            LogicalPlan::Limit(node) => descend!(Limit, node),
        }
    }
}

impl Default for LogicalOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a predicate into its top-level conjuncts
fn conjuncts(expr: &Expression) -> Vec<&Expression> {
    match expr {
        Expression::Function(function) if function.name == "and" => {
            let mut parts = conjuncts(&function.args[0]);
            parts.extend(conjuncts(&function.args[1]));
            parts
        }
        other => vec![other],
    }
}

fn conjoin(left: Expression, right: Expression) -> PipeQueryResult<Expression> {
    Expression::function("and", vec![left, right])
}

/// Whether every field the expression references exists in the given set.
/// A node referencing an unknown field must stay in the plan so compilation
/// rejects it with FieldNotFound instead of the scan silently dropping it.
fn references_resolve(expr: &Expression, available: &[String]) -> bool {
    expr.references().iter().all(|name| available.contains(name))
}

/// Merges a filter into the relation beneath it when the table can run
/// every conjunct of the predicate. A filter above a merged aggregation or
/// limit stays where it is.
pub struct MergeFilterIntoRelation;

impl RewriteRule for MergeFilterIntoRelation {
    fn name(&self) -> &'static str {
        "MergeFilterIntoRelation"
    }

    fn apply(&self, plan: LogicalPlan) -> PipeQueryResult<RewriteOutcome> {
        let node = match plan {
            LogicalPlan::Filter(node) => node,
            other => return Ok(RewriteOutcome::Unchanged(other)),
        };
        let relation = match *node.child {
            LogicalPlan::Relation(relation) => relation,
            child => {
                return Ok(RewriteOutcome::Unchanged(Filter::new(child, node.condition)));
            }
        };
        let mergeable = relation.pushdown.aggregation.is_none()
            && relation.pushdown.limit.is_none()
            && references_resolve(&node.condition, &relation.output_fields())
            && conjuncts(&node.condition)
                .iter()
                .all(|conjunct| relation.table.supports_predicate(conjunct));
        if !mergeable {
            return Ok(RewriteOutcome::Unchanged(Filter::new(
                LogicalPlan::Relation(relation),
                node.condition,
            )));
        }
        let mut relation = relation;
        relation.pushdown.filter = match relation.pushdown.filter.take() {
            Some(existing) => Some(conjoin(existing, node.condition)?),
            None => Some(node.condition),
        };
        Ok(RewriteOutcome::Replaced(LogicalPlan::Relation(relation)))
    }
}

/// Merges an aggregation into a bare relation scan
pub struct MergeAggregationIntoRelation;

impl RewriteRule for MergeAggregationIntoRelation {
    fn name(&self) -> &'static str {
        "MergeAggregationIntoRelation"
    }

    fn apply(&self, plan: LogicalPlan) -> PipeQueryResult<RewriteOutcome> {
        let node = match plan {
            LogicalPlan::Aggregation(node) => node,
            other => return Ok(RewriteOutcome::Unchanged(other)),
        };
        let relation = match *node.child {
            LogicalPlan::Relation(relation) => relation,
            child => {
                return Ok(RewriteOutcome::Unchanged(
                    crate::planner::logical_plan::Aggregation::new(
                        child,
                        node.aggregators,
                        node.group_by,
                    ),
                ));
            }
        };
        let available = relation.output_fields();
        let mergeable = relation.table.capability().aggregate
            && relation.pushdown.aggregation.is_none()
            && relation.pushdown.projections.is_none()
            && relation.pushdown.sort.is_none()
            && relation.pushdown.limit.is_none()
            && node
                .aggregators
                .iter()
                .all(|agg| references_resolve(&agg.argument, &available))
            && node
                .group_by
                .iter()
                .all(|group| references_resolve(&group.delegate, &available));
        if !mergeable {
            return Ok(RewriteOutcome::Unchanged(
                crate::planner::logical_plan::Aggregation::new(
                    LogicalPlan::Relation(relation),
                    node.aggregators,
                    node.group_by,
                ),
            ));
        }
        let mut relation = relation;
        relation.pushdown.aggregation = Some((node.aggregators, node.group_by));
        Ok(RewriteOutcome::Replaced(LogicalPlan::Relation(relation)))
    }
}

/// Merges a sort over plain field references into the relation
pub struct MergeSortIntoRelation;

impl RewriteRule for MergeSortIntoRelation {
    fn name(&self) -> &'static str {
        "MergeSortIntoRelation"
    }

    fn apply(&self, plan: LogicalPlan) -> PipeQueryResult<RewriteOutcome> {
        let node = match plan {
            LogicalPlan::Sort(node) => node,
            other => return Ok(RewriteOutcome::Unchanged(other)),
        };
        let relation = match *node.child {
            LogicalPlan::Relation(relation) => relation,
            child => {
                return Ok(RewriteOutcome::Unchanged(
                    crate::planner::logical_plan::Sort::new(child, node.sort_list),
                ));
            }
        };
        let available = relation.output_fields();
        let reference_only = node.sort_list.iter().all(|key| {
            matches!(&key.expr, Expression::Reference(reference) if available.contains(&reference.name))
        });
        let mergeable = relation.table.capability().sort
            && relation.pushdown.sort.is_none()
            && relation.pushdown.limit.is_none()
            && reference_only;
        if !mergeable {
            return Ok(RewriteOutcome::Unchanged(
                crate::planner::logical_plan::Sort::new(
                    LogicalPlan::Relation(relation),
                    node.sort_list,
                ),
            ));
        }
        let mut relation = relation;
        relation.pushdown.sort = Some(node.sort_list);
        Ok(RewriteOutcome::Replaced(LogicalPlan::Relation(relation)))
    }
}

/// Merges a limit into the relation directly beneath it
pub struct MergeLimitIntoRelation;

impl RewriteRule for MergeLimitIntoRelation {
    fn name(&self) -> &'static str {
        "MergeLimitIntoRelation"
    }

    fn apply(&self, plan: LogicalPlan) -> PipeQueryResult<RewriteOutcome> {
        let node = match plan {
            LogicalPlan::Limit(node) => node,
            other => return Ok(RewriteOutcome::Unchanged(other)),
        };
        let relation = match *node.child {
            LogicalPlan::Relation(relation) => relation,
            child => {
                return Ok(RewriteOutcome::Unchanged(
                    crate::planner::logical_plan::Limit::new(child, node.limit, node.offset),
                ));
            }
        };
        if !relation.table.capability().limit || relation.pushdown.limit.is_some() {
            return Ok(RewriteOutcome::Unchanged(
                crate::planner::logical_plan::Limit::new(
                    LogicalPlan::Relation(relation),
                    node.limit,
                    node.offset,
                ),
            ));
        }
        let mut relation = relation;
        relation.pushdown.limit = Some((node.limit, node.offset));
        Ok(RewriteOutcome::Replaced(LogicalPlan::Relation(relation)))
    }
}

/// Narrows the relation scan to the fields a reference-only projection
/// needs. The projection itself stays in the plan; only the column set
/// travels down.
pub struct MergeProjectIntoRelation;

impl RewriteRule for MergeProjectIntoRelation {
    fn name(&self) -> &'static str {
        "MergeProjectIntoRelation"
    }

    fn apply(&self, plan: LogicalPlan) -> PipeQueryResult<RewriteOutcome> {
        let node = match plan {
            LogicalPlan::Project(node) => node,
            other => return Ok(RewriteOutcome::Unchanged(other)),
        };
        let relation = match *node.child {
            LogicalPlan::Relation(relation) => relation,
            child => {
                return Ok(RewriteOutcome::Unchanged(
                    crate::planner::logical_plan::Project::new(child, node.projections),
                ));
            }
        };
        let schema_fields = relation.output_fields();
        let mut needed: Vec<String> = Vec::new();
        for projection in &node.projections {
            for name in projection.delegate.references() {
                if !needed.contains(&name) {
                    needed.push(name);
                }
            }
        }
        let mergeable = relation.table.capability().project
            && relation.pushdown.projections.is_none()
            && relation.pushdown.aggregation.is_none()
            && !needed.is_empty()
            && needed.iter().all(|name| schema_fields.contains(name));
        if !mergeable {
            return Ok(RewriteOutcome::Unchanged(
                crate::planner::logical_plan::Project::new(
                    LogicalPlan::Relation(relation),
                    node.projections,
                ),
            ));
        }
        let mut relation = relation;
        relation.pushdown.projections = Some(needed);
        Ok(RewriteOutcome::Replaced(crate::planner::logical_plan::Project::new(
            LogicalPlan::Relation(relation),
            node.projections,
        )))
    }
}
