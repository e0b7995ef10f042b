//! Per-seat focus and implicit grab state

use crate::display::WindowHandle;

/// What started an implicit grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabToken {
    /// Pointer button code
    Button(u32),
    /// Raw (untranslated) touch-point id
    Touch(i32),
}

impl GrabToken {
    /// Raw numeric value as reported to the host.
    pub fn raw(self) -> u32 {
        match self {
            GrabToken::Button(code) => code,
            GrabToken::Touch(id) => id as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grab {
    pub window: WindowHandle,
    pub token: GrabToken,
}

/// Focus and grab bookkeeping shared by the devices of one seat.
///
/// A grab exists only between the press that created it and the matching
/// release or cancel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusGrabState {
    keyboard_focus: Option<WindowHandle>,
    pointer_focus: Option<WindowHandle>,
    grab: Option<Grab>,
}

impl FocusGrabState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyboard_focus(&self) -> Option<WindowHandle> {
        self.keyboard_focus
    }

    pub fn set_keyboard_focus(&mut self, window: Option<WindowHandle>) {
        self.keyboard_focus = window;
    }

    pub fn pointer_focus(&self) -> Option<WindowHandle> {
        self.pointer_focus
    }

    pub fn set_pointer_focus(&mut self, window: Option<WindowHandle>) {
        self.pointer_focus = window;
    }

    pub fn grab(&self) -> Option<Grab> {
        self.grab
    }

    /// Starts a grab unless one is already active. First press wins.
    pub fn begin_grab(&mut self, window: WindowHandle, token: GrabToken) -> bool {
        if self.grab.is_some() {
            return false;
        }
        self.grab = Some(Grab { window, token });
        true
    }

    /// Ends the grab if it was started by `token`.
    pub fn end_grab(&mut self, token: GrabToken) -> bool {
        match self.grab {
            Some(grab) if grab.token == token => {
                self.grab = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear_grab(&mut self) -> Option<Grab> {
        self.grab.take()
    }

    /// True while a grab routes motion to a window other than the focused one.
    pub fn grab_excludes_focus(&self) -> bool {
        match self.grab {
            Some(grab) => Some(grab.window) != self.pointer_focus,
            None => false,
        }
    }
}
