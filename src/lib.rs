pub mod action;
pub mod actor;
pub mod card;
pub mod city;
pub mod error;
pub mod evaluator;
pub mod game_phase;
pub mod game_state;
pub mod loader;
pub mod manager;
pub mod map;
pub mod mcts;
pub mod player;

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate smallvec;
