/// Iterator over overlapping token windows and their start offsets.
///
/// A non-empty sequence shorter than the window yields itself once at offset 0,
/// so that short documents still produce a shingle.
pub struct ShingleIter<'a, T> {
    tokens: &'a [T],
    window_size: usize,
    position: usize,
}

impl<'a, T> ShingleIter<'a, T> {
    pub fn new(tokens: &'a [T], window_size: usize) -> Self {
        debug_assert!(window_size >= 1);
        Self {
            tokens,
            window_size: window_size.min(tokens.len()).max(1),
            position: 0,
        }
    }
}

impl<'a, T> Iterator for ShingleIter<'a, T> {
    type Item = (usize, &'a [T]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.tokens.len() < self.position + self.window_size {
            return None;
        }
        let offset = self.position;
        self.position += 1;
        Some((offset, &self.tokens[offset..offset + self.window_size]))
    }
}
