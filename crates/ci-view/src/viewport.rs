//! Zoom and pan transform between layout space and screen space.

use crate::graph::Point;

/// Input that initiated a zoom or pan gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomTrigger {
    Wheel,
    MouseDown,
    DoubleClick,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoomPolicy {
    #[default]
    Free,
    /// Scale stays within [1, 2]; only wheel and drag gestures are honoured.
    Restricted,
}

impl ZoomPolicy {
    pub fn scale_extent(&self) -> (f64, f64) {
        match self {
            ZoomPolicy::Free => (0.1, 10.0),
            ZoomPolicy::Restricted => (1.0, 2.0),
        }
    }

    pub fn accepts(&self, trigger: ZoomTrigger) -> bool {
        match self {
            ZoomPolicy::Free => true,
            ZoomPolicy::Restricted => {
                matches!(trigger, ZoomTrigger::Wheel | ZoomTrigger::MouseDown)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    policy: ZoomPolicy,
    scale: f64,
    translate: Point,
}

impl Viewport {
    pub fn new(policy: ZoomPolicy) -> Self {
        Self {
            policy,
            scale: 1.0,
            translate: Point::default(),
        }
    }

    pub fn policy(&self) -> ZoomPolicy {
        self.policy
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> Point {
        self.translate
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.translate = Point::default();
    }

    /// Multiply the scale by `factor`, keeping the screen point `anchor`
    /// over the same layout point. Returns `false` if the gesture is refused.
    pub fn zoom_by(&mut self, factor: f64, anchor: Point, trigger: ZoomTrigger) -> bool {
        if !self.policy.accepts(trigger) || !factor.is_finite() || factor <= 0.0 {
            return false;
        }
        let world = self.to_world(anchor);
        let (min, max) = self.policy.scale_extent();
        self.scale = (self.scale * factor).clamp(min, max);
        self.translate = Point::new(
            anchor.x - world.x * self.scale,
            anchor.y - world.y * self.scale,
        );
        true
    }

    pub fn pan(&mut self, dx: f64, dy: f64, trigger: ZoomTrigger) -> bool {
        if !self.policy.accepts(trigger) {
            return false;
        }
        self.translate.x += dx;
        self.translate.y += dy;
        true
    }

    pub fn to_screen(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.translate.x,
            p.y * self.scale + self.translate.y,
        )
    }

    pub fn to_world(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.translate.x) / self.scale,
            (p.y - self.translate.y) / self.scale,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomPolicy::default())
    }
}
