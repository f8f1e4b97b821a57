use tracing::warn;

use tablesmith_core::{CycleSignal, find_cycle};
use tablesmith_store::Store;

use crate::errors::ProcessError;
use crate::materializer::Pass;

/// Continue a pass whose pending models contain a dependency cycle.
///
/// Stores that do not enforce foreign keys accept tables in any order, so
/// every pending model is materialized by name. Enforcing stores would reject
/// part of the cycle; nothing is touched and the result explains the manual
/// fix instead.
pub(crate) async fn handle_cycle<S>(
    pass: &mut Pass<'_, S>,
    signal: CycleSignal,
) -> Result<(), ProcessError>
where
    S: Store + ?Sized,
{
    pass.result.has_circular_dependencies = true;
    let models: Vec<String> = pass.snapshot.keys().cloned().collect();

    if !pass.store.supports_foreign_key_enforcement() {
        warn!(
            engine = pass.store.engine(),
            unresolved = ?signal.unresolved,
            "circular dependency ignored; store does not enforce foreign keys"
        );
        for model in &models {
            pass.materialize(model, false).await?;
        }
        return Ok(());
    }

    let mut cycle = find_cycle(&pass.snapshot);
    if cycle.is_empty() {
        cycle = signal.unresolved;
    }
    warn!(
        engine = pass.store.engine(),
        cycle = %render_cycle(&cycle),
        "circular dependency blocks materialization"
    );
    pass.result.errors.push(remediation_message(&cycle));
    for model in &models {
        pass.defer(model);
    }
    Ok(())
}

/// `A -> B -> A` for the chain `[A, B]`.
fn render_cycle(cycle: &[String]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first);
    }
    parts.join(" -> ")
}

fn remediation_message(cycle: &[String]) -> String {
    format!(
        "circular dependency detected: {}. The store enforces foreign keys, so these tables \
         cannot be created automatically. Create the tables of {} without their foreign key \
         constraints, then add the constraints once every table exists.",
        render_cycle(cycle),
        cycle.join(", ")
    )
}
