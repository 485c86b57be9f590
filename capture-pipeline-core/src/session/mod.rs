pub mod controller;
pub mod sealer;
