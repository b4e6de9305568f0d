use pipequery::planner::logical_plan::{
    Aggregation, Column, Filter, Limit, LogicalPlan, Project, Relation, Sort, SortKey,
};
use pipequery::{
    execute, AggregateFunction, Capability, ExprType, ExprValue, Expression, InMemoryTable,
    LogicalOptimizer, NamedAggregator, NamedExpression, PhysicalPlanner, PipeQueryResult,
    SortOption,
};
use std::sync::Arc;

fn order_row(item: &str, qty: i32) -> ExprValue {
    ExprValue::tuple(vec![
        ("item".to_string(), ExprValue::String(item.to_string())),
        ("qty".to_string(), ExprValue::Integer(qty)),
    ])
}

fn orders(capability: Capability) -> Arc<InMemoryTable> {
    Arc::new(
        InMemoryTable::new(
            vec![
                Column::new("item", ExprType::String),
                Column::new("qty", ExprType::Integer),
            ],
            vec![
                order_row("pen", 3),
                order_row("ink", 1),
                order_row("pen", 5),
                order_row("pad", 2),
                order_row("ink", 4),
            ],
        )
        .with_capability(capability),
    )
}

fn run_unoptimized(plan: &LogicalPlan) -> PipeQueryResult<Vec<ExprValue>> {
    let mut operator = PhysicalPlanner::new().compile(plan)?;
    execute(operator.as_mut())
}

fn run_optimized(plan: LogicalPlan) -> PipeQueryResult<Vec<ExprValue>> {
    let optimized = LogicalOptimizer::new().optimize(plan)?;
    run_unoptimized(&optimized)
}

fn pipeline(table: Arc<InMemoryTable>) -> PipeQueryResult<LogicalPlan> {
    let condition = Expression::function(
        ">",
        vec![
            Expression::reference("qty", ExprType::Integer),
            Expression::literal(1),
        ],
    )?;
    let filtered = Filter::new(Relation::new("orders", table), condition);
    let sorted = Sort::new(
        filtered,
        vec![SortKey::new(
            Expression::reference("qty", ExprType::Integer),
            SortOption::desc(),
        )],
    );
    Ok(Limit::new(
        Project::new(
            sorted,
            vec![NamedExpression::new(
                "item",
                Expression::reference("item", ExprType::String),
            )],
        ),
        3,
        0,
    ))
}

#[test]
fn test_optimized_pipeline_matches_unoptimized() -> PipeQueryResult<()> {
    let baseline = run_unoptimized(&pipeline(orders(Capability::none()))?)?;
    let optimized = run_optimized(pipeline(orders(Capability::all()))?)?;
    assert_eq!(baseline, optimized);
    assert_eq!(
        baseline
            .iter()
            .map(|row| row.tuple_get("item").unwrap())
            .collect::<Vec<_>>(),
        vec![
            ExprValue::String("pen".into()),
            ExprValue::String("ink".into()),
            ExprValue::String("pen".into()),
        ]
    );
    Ok(())
}

#[test]
fn test_aggregation_pushdown_matches_operator_aggregation() -> PipeQueryResult<()> {
    let plan = |capability: Capability| {
        Aggregation::new(
            Relation::new("orders", orders(capability)),
            vec![NamedAggregator::new(
                "total",
                AggregateFunction::Sum,
                Expression::reference("qty", ExprType::Integer),
            )],
            vec![NamedExpression::new(
                "item",
                Expression::reference("item", ExprType::String),
            )],
        )
    };
    let baseline = run_unoptimized(&plan(Capability::none()))?;
    let optimized = run_optimized(plan(Capability::all()))?;
    assert_eq!(baseline, optimized);
    Ok(())
}

#[test]
fn test_unknown_filter_field_fails_regardless_of_capability() {
    for capability in [Capability::none(), Capability::all()] {
        let plan = Filter::new(
            Relation::new("orders", orders(capability)),
            Expression::function(
                ">",
                vec![
                    Expression::reference("salary", ExprType::Integer),
                    Expression::literal(0),
                ],
            )
            .unwrap(),
        );
        let result = run_optimized(plan);
        assert!(
            matches!(result, Err(pipequery::PipeQueryError::FieldNotFound(ref name)) if name == "salary"),
            "expected FieldNotFound, got {:?}",
            result
        );
    }
}

#[test]
fn test_unknown_aggregation_field_fails_regardless_of_capability() {
    for capability in [Capability::none(), Capability::all()] {
        let plan = Aggregation::new(
            Relation::new("orders", orders(capability)),
            vec![NamedAggregator::new(
                "total",
                AggregateFunction::Sum,
                Expression::reference("salary", ExprType::Integer),
            )],
            vec![],
        );
        let result = run_optimized(plan);
        assert!(
            matches!(result, Err(pipequery::PipeQueryError::FieldNotFound(ref name)) if name == "salary"),
            "expected FieldNotFound, got {:?}",
            result
        );
    }
}

#[test]
fn test_optimizer_reaches_fixed_point() -> PipeQueryResult<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let plan = pipeline(orders(Capability::all()))?;
    let optimizer = LogicalOptimizer::new();
    let once = optimizer.optimize(plan)?;
    let twice = optimizer.optimize(once.clone())?;
    assert_eq!(once, twice);
    Ok(())
}
