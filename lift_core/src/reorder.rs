//! Drag-to-reorder for exercise cards.
//!
//! The presentation layer reports pointer events together with the current
//! layout of the cards in the container; this module decides where the
//! placeholder goes and, when the drag ends, which index the dragged entry
//! lands on. It never touches the session itself: the caller applies the
//! returned [`ReorderCommit`].
//!
//! State machine: `Idle -> Dragging -> Idle`, leaving `Dragging` on both
//! release and cancellation.

use crate::ExerciseId;

/// Vertical extent of one card in the container, in container coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardBounds {
    pub id: ExerciseId,
    pub top: f64,
    pub height: f64,
}

impl CardBounds {
    pub fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// What the pointer went down on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerTarget {
    /// The drag handle of a card
    DragHandle(ExerciseId),
    /// Some other part of a card
    Card(ExerciseId),
    /// Anything outside the tracked container
    Outside,
}

/// Visual state to render while dragging
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragFeedback {
    pub moving: ExerciseId,
    /// Top edge of the detached card, following the pointer
    pub floating_top: f64,
    /// Index of the placeholder among the cards that are not being dragged
    pub placeholder_index: usize,
    pub placeholder_height: f64,
}

/// Final position for the dragged entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReorderCommit {
    pub id: ExerciseId,
    pub to_index: usize,
}

#[derive(Clone, Debug)]
struct DragSession {
    moving: ExerciseId,
    pointer_offset: f64,
    height: f64,
    placeholder_index: usize,
}

/// Tracks at most one drag at a time
#[derive(Clone, Debug, Default)]
pub struct ReorderController {
    drag: Option<DragSession>,
}

impl ReorderController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Id of the entry being dragged, if any
    pub fn moving(&self) -> Option<ExerciseId> {
        self.drag.as_ref().map(|d| d.moving)
    }

    /// Pointer went down
    ///
    /// Starts a drag only when the target is a drag handle of a card present
    /// in `cards` and no drag is already running. The placeholder starts at
    /// the card's own position.
    pub fn pointer_down(
        &mut self,
        target: PointerTarget,
        pointer_y: f64,
        cards: &[CardBounds],
    ) -> Option<DragFeedback> {
        if self.drag.is_some() {
            tracing::debug!("Pointer down ignored, drag already in progress");
            return None;
        }

        let PointerTarget::DragHandle(id) = target else {
            return None;
        };

        let Some(index) = cards.iter().position(|c| c.id == id) else {
            tracing::warn!("Drag handle for {} is not in the tracked container", id);
            return None;
        };
        let card = cards[index];

        let drag = DragSession {
            moving: id,
            pointer_offset: pointer_y - card.top,
            height: card.height,
            placeholder_index: index,
        };
        let feedback = drag.feedback(pointer_y);
        tracing::debug!("Drag started for {} at index {}", id, index);
        self.drag = Some(drag);
        Some(feedback)
    }

    /// Pointer moved while dragging
    ///
    /// Places the placeholder right before the first other card (scanning
    /// down) whose midpoint is below the pointer, i.e. right after the last
    /// card whose midpoint is above it; at the top when there is none above.
    pub fn pointer_move(&mut self, pointer_y: f64, cards: &[CardBounds]) -> Option<DragFeedback> {
        let drag = self.drag.as_mut()?;
        let moving = drag.moving;

        let others: Vec<&CardBounds> = cards.iter().filter(|c| c.id != moving).collect();
        drag.placeholder_index = others
            .iter()
            .position(|c| c.midpoint() > pointer_y)
            .unwrap_or(others.len());

        Some(drag.feedback(pointer_y))
    }

    /// Pointer released: the drag ends at the placeholder
    pub fn pointer_up(&mut self) -> Option<ReorderCommit> {
        let drag = self.drag.take()?;
        tracing::debug!(
            "Drag of {} committed at index {}",
            drag.moving,
            drag.placeholder_index
        );
        Some(drag.commit())
    }

    /// Drag torn down externally (container removed, navigation, ...)
    ///
    /// The entry still goes back at the placeholder's last index so nothing
    /// is left detached. Safe to call when idle.
    pub fn cancel(&mut self) -> Option<ReorderCommit> {
        let drag = self.drag.take()?;
        tracing::debug!(
            "Drag of {} cancelled, restoring at index {}",
            drag.moving,
            drag.placeholder_index
        );
        Some(drag.commit())
    }
}

impl DragSession {
    fn feedback(&self, pointer_y: f64) -> DragFeedback {
        DragFeedback {
            moving: self.moving,
            floating_top: pointer_y - self.pointer_offset,
            placeholder_index: self.placeholder_index,
            placeholder_height: self.height,
        }
    }

    fn commit(self) -> ReorderCommit {
        ReorderCommit {
            id: self.moving,
            to_index: self.placeholder_index,
        }
    }
}
