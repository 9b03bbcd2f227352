pub mod interaction;
pub mod voice_state;
