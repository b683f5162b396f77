pub mod join_planner;

pub use join_planner::{JoinPlanner, LogicalJoinNode};
