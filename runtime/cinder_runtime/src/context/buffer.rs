//! Output buffering.
//!
//! Output is written to the top buffer of the current context. `flush`
//! hands the text to the parent, but only while this context holds a single
//! buffer: an extra pushed buffer means someone is capturing output.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::RuntimeResult;
use crate::value::Value;

use super::ExecutionContext;

/// A shared text buffer.
#[derive(Clone, Debug, Default)]
pub struct OutputBuffer(Arc<Mutex<String>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, text: &str) {
        self.0.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.0.lock().clone()
    }

    /// Remove and return everything buffered.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

impl ExecutionContext<'_> {
    /// Append a value's text to the top buffer.
    pub fn write(&self, value: &Value) -> RuntimeResult<()> {
        let text = value.cast_string()?;
        self.write_str(&text);
        Ok(())
    }

    pub fn write_str(&self, text: &str) {
        self.buffer().append(text);
    }

    /// The top buffer.
    pub fn buffer(&self) -> OutputBuffer {
        let buffers = self.buffers.borrow();
        // The base buffer is never popped.
        buffers.last().cloned().unwrap_or_default()
    }

    /// Redirect output to a fresh buffer until it is popped.
    pub fn push_buffer(&self) -> OutputBuffer {
        let buffer = OutputBuffer::new();
        self.buffers.borrow_mut().push(buffer.clone());
        buffer
    }

    /// Pop a pushed buffer. The base buffer stays.
    pub fn pop_buffer(&self) -> Option<OutputBuffer> {
        let mut buffers = self.buffers.borrow_mut();
        if buffers.len() <= 1 {
            return None;
        }
        buffers.pop()
    }

    pub fn buffer_depth(&self) -> usize {
        self.buffers.borrow().len()
    }

    pub fn clear_buffer(&self) {
        self.buffer().clear();
    }

    /// Move buffered output to the parent, or to the runtime's sink at the root.
    ///
    /// Nothing moves while a pushed buffer is active. With `force`, every
    /// ancestor flushes too.
    pub fn flush(&self, force: bool) {
        match self.parent {
            Some(parent) => self.flush_into(parent),
            None => {
                if let Some(text) = self.take_flushable() {
                    self.runtime.output().write(&text);
                }
            }
        }
        if force {
            if let Some(parent) = self.parent {
                parent.flush(true);
            }
        }
    }

    /// Move buffered output to `target`'s top buffer.
    ///
    /// A call flushes into the context that made it, which is not always
    /// its parent, so output keeps call order.
    pub(super) fn flush_into(&self, target: &ExecutionContext<'_>) {
        if let Some(text) = self.take_flushable() {
            target.write_str(&text);
        }
    }

    fn take_flushable(&self) -> Option<String> {
        if self.buffer_depth() != 1 {
            return None;
        }
        let text = self.buffer().take();
        (!text.is_empty()).then_some(text)
    }
}
