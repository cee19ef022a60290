//! Per-index content-block accumulator shared by both provider parsers
//! (spec §4.3 point 2: "a block may be text, reasoning, or a partial tool
//! call... tool-call argument fragments are appended to a per-index buffer").

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum BlockState {
    Text,
    Reasoning {
        reasoning_id: Option<String>,
    },
    RedactedReasoning {
        payload: String,
    },
    ToolCall {
        id: String,
        name: String,
        args_buf: String,
    },
}

#[derive(Debug, Default)]
pub struct BlockAccumulator {
    blocks: HashMap<usize, BlockState>,
}

impl BlockAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, index: usize, state: BlockState) {
        self.blocks.insert(index, state);
    }

    pub fn get(&self, index: usize) -> Option<&BlockState> {
        self.blocks.get(&index)
    }

    pub fn append_tool_args(&mut self, index: usize, fragment: &str) {
        if let Some(BlockState::ToolCall { args_buf, .. }) = self.blocks.get_mut(&index) {
            args_buf.push_str(fragment);
        }
    }

    pub fn take(&mut self, index: usize) -> Option<BlockState> {
        self.blocks.remove(&index)
    }
}
