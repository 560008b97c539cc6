use crate::domain::ids::{StageId, StageTemplateId, TaskId, TaskTemplateId};
use crate::domain::ordering::{Direction, OrderedItem, PositionWrite, neighbour, swap_plan};
use crate::domain::ports::WorkflowStoreRef;
use crate::domain::workflow::Position;
use crate::error::Result;

/// Moves stages, tasks and their templates one slot up or down.
pub struct Reorderer {
    store: WorkflowStoreRef,
}

impl Reorderer {
    pub fn new(store: WorkflowStoreRef) -> Self {
        Self { store }
    }

    /// Moves a project stage within its project.
    pub async fn move_stage(&self, stage: StageId, direction: Direction) -> Result<bool> {
        self.move_item(OrderedItem::Stage(stage), direction).await
    }

    /// Moves a task within its stage.
    pub async fn move_task(&self, task: TaskId, direction: Direction) -> Result<bool> {
        self.move_item(OrderedItem::Task(task), direction).await
    }

    pub async fn move_stage_template(
        &self,
        stage: StageTemplateId,
        direction: Direction,
    ) -> Result<bool> {
        self.move_item(OrderedItem::StageTemplate(stage), direction)
            .await
    }

    pub async fn move_task_template(
        &self,
        task: TaskTemplateId,
        direction: Direction,
    ) -> Result<bool> {
        self.move_item(OrderedItem::TaskTemplate(task), direction)
            .await
    }

    /// Swaps `item` with its neighbour through the sentinel position.
    ///
    /// Returns `false` without writing when `item` already sits at that end
    /// of its list. If a write fails, the writes already applied are undone
    /// in reverse order before the error is returned.
    pub async fn move_item(&self, item: OrderedItem, direction: Direction) -> Result<bool> {
        let siblings = self.store.sibling_positions(item).await?;
        let Some((moved, other)) = neighbour(&siblings, item, direction) else {
            return Ok(false);
        };

        let plan = swap_plan(moved, other);
        let previous = [moved.position, other.position, plan[0].position];
        for (step, write) in plan.iter().enumerate() {
            if let Err(e) = self.store.update_position(write.item, write.position).await {
                tracing::warn!(?item, step, error = %e, "Reorder failed, reverting");
                self.revert(&plan[..step], &previous[..step]).await;
                return Err(e);
            }
        }

        tracing::debug!(
            ?item,
            ?direction,
            from = moved.position,
            to = other.position,
            "Item moved"
        );
        Ok(true)
    }

    async fn revert(&self, applied: &[PositionWrite], previous: &[Position]) {
        for (write, position) in applied.iter().zip(previous).rev() {
            if let Err(e) = self.store.update_position(write.item, *position).await {
                tracing::error!(item = ?write.item, error = %e, "Could not revert position");
            }
        }
    }
}
