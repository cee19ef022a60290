//! Instruction-file parsing and system-prompt templating (spec §6).

mod instructions;
mod template;

pub use instructions::{resolve_includes, InstructionFile};
pub use template::TemplateContext;
