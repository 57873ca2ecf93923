use crate::action::Action;
use crate::game_state::GameState;

pub type NodeId = u32;

/// A state of the search tree, and the statistics of the edge leading to it.
#[derive(Clone, Debug)]
pub struct Node {
    pub state: GameState,
    /// `None` only for the root.
    pub incoming_action: Option<Action>,
    pub prior: f32,
    pub visit_count: u32,
    pub value_sum: f32,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Player whose point of view `value_sum` is in: the one who chose `incoming_action`.
    pub player: usize,
    pub is_expanded: bool,
}

impl Node {
    pub fn new(
        state: GameState,
        incoming_action: Option<Action>,
        prior: f32,
        parent: Option<NodeId>,
        player: usize,
    ) -> Self {
        Self {
            state,
            incoming_action,
            prior,
            visit_count: 0,
            value_sum: 0.0,
            children: Vec::new(),
            parent,
            player,
            is_expanded: false,
        }
    }

    /// Mean value of the node, `0` while unvisited.
    #[inline]
    pub fn q(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state.is_over()
    }

    /// Player about to act in this node's state.
    #[inline]
    pub fn to_play(&self) -> usize {
        self.state.active_player()
    }
}
