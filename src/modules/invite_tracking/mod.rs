pub mod commands;
pub mod events;
pub mod platform;
pub mod tracking;

use super::{Module, ModuleDefinition};

pub fn module() -> Module {
    Module {
        definition: ModuleDefinition {
            id: "invite_tracking",
            name: "Invite Tracking",
            description: "Credits members for the people they bring into a server",
        },
        commands: commands::commands(),
        event_handlers: vec![events::handler],
    }
}
