/// Ordered track list with a forward-only cursor. Moving past the last
/// entry is refused rather than wrapping around.
#[derive(Debug, Clone)]
pub struct Playlist<T> {
    items: Vec<T>,
    index: usize,
}

impl<T> Playlist<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, index: 0 }
    }

    pub fn current(&self) -> Option<&T> {
        self.items.get(self.index)
    }

    /// Moves to the next entry. Returns `None` and stays put on the last one.
    pub fn advance(&mut self) -> Option<&T> {
        if self.index + 1 >= self.items.len() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
