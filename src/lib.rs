pub mod actor;
pub mod config;
pub mod error;
pub mod events;
pub mod processing {
    pub mod layout;
    pub mod motion;
}
pub mod render {
    pub mod canvas;
}
pub mod tasks {
    pub mod clock;
    pub mod files;
    pub mod loader;
    pub mod preview;
}

pub use actor::{ActorHandle, ActorState, ImageActor};
