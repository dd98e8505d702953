// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contracts for the drawing surface and the drawable graphics.
//!
//! Cadence never rasterizes anything itself. Repair leaves drive two
//! host-provided collaborators:
//!
//! - **[`Canvas`]**: a clipped, double-buffered drawing surface. Backends
//!   wrap whatever the toolkit offers (an X11 drawable, a `CALayer` backing
//!   store, an offscreen pixmap).
//! - **[`Graphics`]**: the scene of drawable graphics, addressed by opaque
//!   [`GraphicId`] handles. The editor owns the graphics and keeps mutating
//!   them during a gesture; leaves only hold the handle.
//!
//! # Tick pseudocode
//!
//! ```rust,ignore
//! fn on_timer(token: TimerToken, fired_at: HostTime) {
//!     let mut stage = Stage::new(&mut tree, &mut canvas, &mut scene);
//!     pacemaker.fire(&mut stage, token, fired_at);
//! }
//! ```

use core::fmt;

use kurbo::Rect;

/// Opaque reference to a drawable graphic owned by the host scene.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphicId(pub u32);

impl fmt::Debug for GraphicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphicId({})", self.0)
    }
}

/// Which buffer subsequent drawing goes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Buffer {
    /// The visible buffer.
    #[default]
    Front,
    /// The offscreen buffer, shown by [`Canvas::swap_buffers`].
    Back,
}

/// A clipped, double-buffered drawing surface.
pub trait Canvas {
    /// Fills `rect` with the background, erasing what was there.
    fn fill(&mut self, rect: Rect);

    /// Draws an inverted (XOR) outline of `rect`. Drawing the same outline
    /// twice restores the previous pixels.
    fn xor_rect(&mut self, rect: Rect);

    /// Intersects the clip with `rect` until the matching [`pop_clip`](Self::pop_clip).
    fn push_clip(&mut self, rect: Rect);

    /// Restores the clip in effect before the last [`push_clip`](Self::push_clip).
    fn pop_clip(&mut self);

    /// Selects the buffer drawing goes to.
    fn select_buffer(&mut self, buffer: Buffer);

    /// Copies `rect` of the back buffer to the front buffer.
    fn swap_buffers(&mut self, rect: Rect);

    /// Synchronizes with the display so pending output becomes visible.
    fn flush(&mut self);

    /// Returns the area of the whole surface currently marked damaged by the
    /// host (exposures, toolkit invalidation), if any.
    fn damage(&self) -> Option<Rect>;

    /// Forgets the host damage after it has been repaired.
    fn clear_damage(&mut self);
}

/// The host scene of drawable graphics.
pub trait Graphics {
    /// Draws the graphic onto `canvas`, restricted to `clip`.
    fn draw(&mut self, id: GraphicId, canvas: &mut dyn Canvas, clip: Rect);

    /// Returns the graphic's current bounding box.
    fn bounds(&self, id: GraphicId) -> Rect;

    /// Returns whether the graphic touches `rect`.
    fn intersects(&self, id: GraphicId, rect: Rect) -> bool {
        self.bounds(id).intersect(rect).area() > 0.0
    }

    /// Toggles the selection-feedback rendering of the graphic.
    fn set_feedback(&mut self, id: GraphicId, on: bool);

    /// Sets the blending alpha used while feedback rendering is on.
    fn set_alpha(&mut self, id: GraphicId, alpha: f32);
}
