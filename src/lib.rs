// MateTutor - Socratic math tutor for the ICFES exam
// Library exports

pub mod cli;
pub mod config;
pub mod logging;
pub mod media;
pub mod providers;
pub mod tutor;
