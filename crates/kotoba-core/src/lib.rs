pub mod analysis;
pub mod clock;
pub mod diversify;
pub mod learner;
pub mod lexicon;
pub mod settings;
pub mod unicode;
