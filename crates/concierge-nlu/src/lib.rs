pub mod medical;
pub mod slot_choice;

pub use medical::{detect_caution, detect_emergency, EmergencyCategory};
pub use slot_choice::detect_slot_choice;
