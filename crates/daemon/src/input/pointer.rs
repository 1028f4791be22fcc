//! Virtual pointer position.

/// Screen dimensions in pixels, fixed for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl ScreenSize {
    /// Dimensions below one pixel are raised to one.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.width / 2, self.height / 2)
    }

    pub fn clamp_x(&self, x: i64) -> i32 {
        x.clamp(0, i64::from(self.width) - 1) as i32
    }

    pub fn clamp_y(&self, y: i64) -> i32 {
        y.clamp(0, i64::from(self.height) - 1) as i32
    }
}

/// Current pointer position, always inside `[0, width-1] x [0, height-1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerState {
    x: i32,
    y: i32,
    screen: ScreenSize,
}

impl PointerState {
    /// A pointer at the centre of `screen`.
    pub fn new(screen: ScreenSize) -> Self {
        let (x, y) = screen.center();
        Self { x, y, screen }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Move by a relative offset and return the clamped position.
    pub fn move_by(&mut self, dx: i32, dy: i32) -> (i32, i32) {
        self.x = self.screen.clamp_x(i64::from(self.x) + i64::from(dx));
        self.y = self.screen.clamp_y(i64::from(self.y) + i64::from(dy));
        self.position()
    }

    /// Return to the centre of the screen.
    pub fn reset(&mut self) -> (i32, i32) {
        (self.x, self.y) = self.screen.center();
        self.position()
    }

    /// The point `dy` pixels below the pointer, clamped to the screen.
    pub fn offset_y(&self, dy: i64) -> (i32, i32) {
        (self.x, self.screen.clamp_y(i64::from(self.y) + dy))
    }

    /// The point `(dx, dy)` away from the pointer, clamped to the screen.
    pub fn offset(&self, dx: i64, dy: i64) -> (i32, i32) {
        (
            self.screen.clamp_x(i64::from(self.x) + dx),
            self.screen.clamp_y(i64::from(self.y) + dy),
        )
    }
}
