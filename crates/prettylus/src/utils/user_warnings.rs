use std::cell::RefCell;

/// Warnings that should be shown to the user for a single format request.
///
/// These are separate from the diagnostics log: the host displays them as
/// non-blocking notifications.
#[derive(Debug, Default)]
pub struct UserWarnings {
  messages: RefCell<Vec<String>>,
}

impl UserWarnings {
  pub fn push(&self, message: impl Into<String>) {
    self.messages.borrow_mut().push(message.into());
  }

  pub fn take(&self) -> Vec<String> {
    std::mem::take(&mut *self.messages.borrow_mut())
  }
}
