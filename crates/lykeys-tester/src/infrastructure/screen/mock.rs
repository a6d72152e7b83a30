//! Fixed screen metrics for tests.

use std::sync::Mutex;

use super::{ScreenError, ScreenMetrics};

#[derive(Debug)]
pub struct MockScreen {
    pub size: (i32, i32),
    pub cursor: Mutex<(i32, i32)>,
}

impl MockScreen {
    pub fn new(size: (i32, i32), cursor: (i32, i32)) -> Self {
        Self {
            size,
            cursor: Mutex::new(cursor),
        }
    }
}

impl Default for MockScreen {
    fn default() -> Self {
        Self::new((1920, 1080), (960, 540))
    }
}

impl ScreenMetrics for MockScreen {
    fn cursor_position(&self) -> Result<(i32, i32), ScreenError> {
        Ok(*self.cursor.lock().expect("lock poisoned"))
    }

    fn screen_size(&self) -> Result<(i32, i32), ScreenError> {
        Ok(self.size)
    }
}
