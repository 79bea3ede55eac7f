mod http_note_generator;

pub use http_note_generator::{DisabledNoteGenerator, HttpNoteGenerator};
