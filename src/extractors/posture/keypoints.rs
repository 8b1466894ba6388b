//! Body keypoints and the planar geometry used by posture indices

use crate::error::ScreeningError;
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

/// Image-space point (pixels, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Dimensions of the frame the keypoints were detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The 13 body landmarks posture analysis needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoints {
    pub nose: Point,
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub left_elbow: Point,
    pub right_elbow: Point,
    pub left_wrist: Point,
    pub right_wrist: Point,
    pub left_hip: Point,
    pub right_hip: Point,
    pub left_knee: Point,
    pub right_knee: Point,
    pub left_ankle: Point,
    pub right_ankle: Point,
}

impl Keypoints {
    pub fn named_points(&self) -> [(&'static str, Point); 13] {
        [
            ("nose", self.nose),
            ("left_shoulder", self.left_shoulder),
            ("right_shoulder", self.right_shoulder),
            ("left_elbow", self.left_elbow),
            ("right_elbow", self.right_elbow),
            ("left_wrist", self.left_wrist),
            ("right_wrist", self.right_wrist),
            ("left_hip", self.left_hip),
            ("right_hip", self.right_hip),
            ("left_knee", self.left_knee),
            ("right_knee", self.right_knee),
            ("left_ankle", self.left_ankle),
            ("right_ankle", self.right_ankle),
        ]
    }

    /// Reject non-finite coordinates and empty frames
    pub fn validate(&self, frame: FrameSize) -> Result<(), ScreeningError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(ScreeningError::InvalidInput(format!(
                "Frame size must be positive, got {}x{}",
                frame.width, frame.height
            )));
        }
        for (name, point) in self.named_points() {
            if !point.is_finite() {
                return Err(ScreeningError::InvalidInput(format!(
                    "Keypoint {name} has a non-finite coordinate"
                )));
            }
        }
        Ok(())
    }

    pub fn shoulder_mid(&self) -> Point {
        self.left_shoulder.midpoint(&self.right_shoulder)
    }

    pub fn hip_mid(&self) -> Point {
        self.left_hip.midpoint(&self.right_hip)
    }

    pub fn ankle_mid(&self) -> Point {
        self.left_ankle.midpoint(&self.right_ankle)
    }

    pub fn shoulder_width(&self) -> f64 {
        self.left_shoulder.distance(&self.right_shoulder)
    }

    /// Vertical extent from nose to the lower ankle
    pub fn body_height(&self) -> f64 {
        self.left_ankle.y.max(self.right_ankle.y) - self.nose.y
    }

    pub fn left_elbow_angle(&self) -> Option<f64> {
        angle_at(&self.left_elbow, &self.left_shoulder, &self.left_wrist)
    }

    pub fn right_elbow_angle(&self) -> Option<f64> {
        angle_at(&self.right_elbow, &self.right_shoulder, &self.right_wrist)
    }

    pub fn left_knee_angle(&self) -> Option<f64> {
        angle_at(&self.left_knee, &self.left_hip, &self.left_ankle)
    }

    pub fn right_knee_angle(&self) -> Option<f64> {
        angle_at(&self.right_knee, &self.right_hip, &self.right_ankle)
    }
}

/// Angle in degrees at `vertex` between rays to `a` and `b`.
/// `None` when either ray has zero length.
pub fn angle_at(vertex: &Point, a: &Point, b: &Point) -> Option<f64> {
    let (ax, ay) = (a.x - vertex.x, a.y - vertex.y);
    let (bx, by) = (b.x - vertex.x, b.y - vertex.y);
    let norms = ax.hypot(ay) * bx.hypot(by);
    if norms < EPSILON {
        return None;
    }
    let cosine = ((ax * bx + ay * by) / norms).clamp(-1.0, 1.0);
    Some(cosine.acos().to_degrees())
}

/// Distance from `p` to the infinite line through `a` and `b`.
/// `None` when `a` and `b` coincide.
pub fn perpendicular_distance(p: &Point, a: &Point, b: &Point) -> Option<f64> {
    let length = a.distance(b);
    if length < EPSILON {
        return None;
    }
    let cross = (b.x - a.x) * (a.y - p.y) - (a.x - p.x) * (b.y - a.y);
    Some(cross.abs() / length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_at_right_angle() {
        let angle = angle_at(
            &Point::new(0.0, 0.0),
            &Point::new(0.0, -1.0),
            &Point::new(1.0, 0.0),
        )
        .unwrap();
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_at_straight_and_degenerate() {
        let vertex = Point::new(1.0, 1.0);
        let straight = angle_at(&vertex, &Point::new(0.0, 1.0), &Point::new(2.0, 1.0)).unwrap();
        assert!((straight - 180.0).abs() < 1e-9);
        assert!(angle_at(&vertex, &vertex, &Point::new(2.0, 1.0)).is_none());
    }

    #[test]
    fn test_perpendicular_distance() {
        let d = perpendicular_distance(
            &Point::new(3.0, 5.0),
            &Point::new(0.0, 0.0),
            &Point::new(0.0, 10.0),
        )
        .unwrap();
        assert!((d - 3.0).abs() < 1e-9);

        let same = Point::new(1.0, 1.0);
        assert!(perpendicular_distance(&Point::new(0.0, 0.0), &same, &same).is_none());
    }

    #[test]
    fn test_validate_rejects_nan_and_empty_frame() {
        let frame = FrameSize::new(640, 480);
        let mut keypoints = crate::synthetic::upright_keypoints(frame);
        assert!(keypoints.validate(frame).is_ok());
        assert!(keypoints.validate(FrameSize::new(0, 480)).is_err());

        keypoints.left_knee.x = f64::NAN;
        assert!(matches!(
            keypoints.validate(frame),
            Err(ScreeningError::InvalidInput(_))
        ));
    }
}
