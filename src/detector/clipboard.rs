//! Clipboard and context-menu intercepts.

use crate::core::label::EventLabel;
use crate::detector::types::{Capability, ClipboardAction, Disposition, HostEvent};
use crate::detector::{Detector, DetectorError, DetectorKind, StartContext};

/// Which operations to block. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardOptions {
    pub block_copy: bool,
    pub block_cut: bool,
    pub block_paste: bool,
    pub block_context_menu: bool,
}

impl Default for ClipboardOptions {
    fn default() -> Self {
        Self {
            block_copy: true,
            block_cut: true,
            block_paste: true,
            block_context_menu: true,
        }
    }
}

/// Blocks clipboard traffic and the context menu, reporting each as `clipboard`.
pub struct ClipboardDetector {
    options: ClipboardOptions,
}

impl ClipboardDetector {
    pub fn new(options: ClipboardOptions) -> Self {
        Self { options }
    }

    fn blocks(&self, action: ClipboardAction) -> bool {
        match action {
            ClipboardAction::Copy => self.options.block_copy,
            ClipboardAction::Cut => self.options.block_cut,
            ClipboardAction::Paste => self.options.block_paste,
        }
    }
}

impl Detector for ClipboardDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Clipboard
    }

    fn start(&mut self, ctx: &StartContext<'_>) -> Result<(), DetectorError> {
        ctx.require(Capability::Clipboard)
    }

    fn handle(&mut self, event: &HostEvent, emit: &mut dyn FnMut(EventLabel)) -> Disposition {
        let blocked = match event {
            HostEvent::Clipboard { action, .. } => self.blocks(*action),
            HostEvent::ContextMenu { .. } => self.options.block_context_menu,
            _ => false,
        };
        if blocked {
            emit(EventLabel::Clipboard);
            Disposition::prevent()
        } else {
            Disposition::default()
        }
    }

    fn stop(&mut self) {}
}
