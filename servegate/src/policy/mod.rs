pub mod decision;
pub mod evaluator;

pub use decision::{Check, Decision};
pub use evaluator::PolicyEvaluator;
