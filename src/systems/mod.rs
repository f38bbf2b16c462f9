mod census;
mod challenges;
mod progression;
mod resolver;

pub use census::Census;
pub use challenges::{
    Challenge, ChallengeBoard, ChallengeEvent, ChallengeId, ChallengeView, Predicate, ROSTER,
};
pub use progression::{ProgressionEvaluator, Unlocks};
pub use resolver::{Resolution, Resolver};
