//! Frame label resolution
//!
//! Turns each frame's held inputs into action ids through the catalog's
//! reverse binding index. When several actions are active in one frame the
//! lowest id becomes the primary label; the full set is kept alongside it.

use crate::catalog::{ActionCatalog, ActionId};
use crate::processing::aligner::FrameWindow;
use serde::Serialize;
use std::collections::BTreeSet;

/// Primary label for frames without any bound input held.
pub const NO_ACTION: ActionId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameActionLabel {
    pub frame_index: u64,
    pub timestamp_ms: i64,
    pub primary_action_id: ActionId,
    pub all_action_ids: BTreeSet<ActionId>,
    pub looking: bool,
}

impl FrameActionLabel {
    /// Ids joined with commas, or `"0"` when nothing is active.
    pub fn all_actions_field(&self) -> String {
        if self.all_action_ids.is_empty() {
            return NO_ACTION.to_string();
        }
        self.all_action_ids
            .iter()
            .map(ActionId::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_idle(&self) -> bool {
        self.all_action_ids.is_empty()
    }
}

pub struct ActionResolver<'a> {
    catalog: &'a ActionCatalog,
}

impl<'a> ActionResolver<'a> {
    pub fn new(catalog: &'a ActionCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve(&self, window: &FrameWindow) -> FrameActionLabel {
        let all_action_ids: BTreeSet<ActionId> = window
            .active
            .iter()
            .flat_map(|input| self.catalog.actions_for_input(input).iter().copied())
            .collect();

        let primary_action_id = all_action_ids.first().copied().unwrap_or(NO_ACTION);

        FrameActionLabel {
            frame_index: window.frame.index,
            timestamp_ms: window.frame.timestamp_ms,
            primary_action_id,
            all_action_ids,
            looking: window.looking,
        }
    }

    pub fn resolve_all(&self, windows: &[FrameWindow]) -> Vec<FrameActionLabel> {
        windows.iter().map(|window| self.resolve(window)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::input::InputEvent;
    use crate::catalog::tests::scenario_catalog;
    use crate::catalog::{ActionDefinition, Category, PhysicalInput};
    use crate::processing::aligner::{EventWindowAligner, Frame};

    fn window(index: u64, inputs: &[PhysicalInput]) -> FrameWindow {
        FrameWindow {
            frame: Frame {
                index,
                timestamp_ms: index as i64 * 100,
            },
            active: inputs.iter().cloned().collect(),
            looking: false,
        }
    }

    #[test]
    fn test_empty_frame_resolves_to_no_action() {
        let catalog = scenario_catalog();
        let label = ActionResolver::new(&catalog).resolve(&window(3, &[]));

        assert_eq!(label.primary_action_id, NO_ACTION);
        assert!(label.is_idle());
        assert_eq!(label.all_actions_field(), "0");
        assert_eq!(label.timestamp_ms, 300);
    }

    #[test]
    fn test_lowest_id_wins() {
        let catalog = scenario_catalog();
        let resolver = ActionResolver::new(&catalog);
        let label = resolver.resolve(&window(
            0,
            &[PhysicalInput::mouse("left"), PhysicalInput::key("space")],
        ));

        assert_eq!(label.primary_action_id, 1);
        assert_eq!(label.all_action_ids, BTreeSet::from([1, 2]));
        assert_eq!(label.all_actions_field(), "1,2");
    }

    #[test]
    fn test_unbound_inputs_are_ignored() {
        let catalog = scenario_catalog();
        let label = ActionResolver::new(&catalog).resolve(&window(0, &[PhysicalInput::key("f12")]));
        assert!(label.is_idle());
    }

    #[test]
    fn test_shared_binding_yields_every_owner() {
        let catalog = ActionCatalog::from_definitions(
            "Shared",
            vec![
                ActionDefinition::new(0, "IDLE", "misc", vec![]),
                ActionDefinition::new(1, "SPRINT", "movement", vec![PhysicalInput::key("shift")]),
                ActionDefinition::new(2, "CROUCH_RUN", "movement", vec![PhysicalInput::key("shift")]),
            ],
            vec![Category::new("misc"), Category::new("movement")],
        )
        .unwrap();

        let label = ActionResolver::new(&catalog).resolve(&window(0, &[PhysicalInput::key("shift")]));
        assert_eq!(label.all_action_ids, BTreeSet::from([1, 2]));
        assert_eq!(label.primary_action_id, 1);
    }

    #[test]
    fn test_aligned_scenario_labels() {
        let catalog = scenario_catalog();
        let aligner = EventWindowAligner::new(10.0, 2).unwrap();
        let alignment = aligner.align(&[
            InputEvent::press(0, PhysicalInput::key("w")),
            InputEvent::press(50, PhysicalInput::key("space")),
            InputEvent::release(120, PhysicalInput::key("w")),
        ]);

        let labels = ActionResolver::new(&catalog).resolve_all(&alignment.windows);
        let move_forward = catalog.lookup_by_name("MOVE_FORWARD").unwrap().id;
        let jump = catalog.lookup_by_name("JUMP").unwrap().id;

        assert_eq!(labels[0].primary_action_id, move_forward);
        assert!(labels[0].all_action_ids.contains(&move_forward));
        assert_eq!(labels[1].primary_action_id, jump);
        assert_eq!(labels[1].all_action_ids, BTreeSet::from([jump]));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let catalog = scenario_catalog();
        let resolver = ActionResolver::new(&catalog);
        let frame = window(
            0,
            &[
                PhysicalInput::mouse("left"),
                PhysicalInput::key("w"),
                PhysicalInput::key("space"),
            ],
        );

        let first = resolver.resolve(&frame);
        for _ in 0..10 {
            assert_eq!(resolver.resolve(&frame), first);
        }
        assert_eq!(first.all_actions_field(), "0,1,2");
    }
}
