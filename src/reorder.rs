//! Drag-and-drop reorder session.
//!
//! While a drag is in progress the display follows a local copy of the line
//! order; the confirmed order in the view only changes when the drag ends.

/// Local line order for the duration of one drag.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReorderSession {
    local: Option<Vec<i64>>,
}

impl ReorderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a drag from the confirmed order.
    pub fn start(&mut self, confirmed: Vec<i64>) {
        self.local = Some(confirmed);
    }

    pub fn is_dragging(&self) -> bool {
        self.local.is_some()
    }

    /// Moves the item at `from` to `to` within the local order. Returns
    /// false when no drag is active or an index is out of range.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let Some(order) = self.local.as_mut() else {
            return false;
        };
        if from >= order.len() || to >= order.len() {
            return false;
        }
        if from != to {
            let id = order.remove(from);
            order.insert(to, id);
        }
        true
    }

    /// Moves `line_id` to sit where `over_id` currently is.
    pub fn move_over(&mut self, line_id: i64, over_id: i64) -> bool {
        let Some(order) = self.local.as_ref() else {
            return false;
        };
        let from = order.iter().position(|id| *id == line_id);
        let to = order.iter().position(|id| *id == over_id);
        match (from, to) {
            (Some(from), Some(to)) => self.move_item(from, to),
            _ => false,
        }
    }

    pub fn local_order(&self) -> Option<&[i64]> {
        self.local.as_deref()
    }

    /// What to display: the drag order while dragging, else `confirmed`.
    pub fn display_order(&self, confirmed: Vec<i64>) -> Vec<i64> {
        self.local.clone().unwrap_or(confirmed)
    }

    /// Ends the drag and hands back the final local order.
    pub fn finish(&mut self) -> Option<Vec<i64>> {
        self.local.take()
    }

    /// Abandons the drag without producing an order.
    pub fn cancel(&mut self) {
        self.local = None;
    }
}
